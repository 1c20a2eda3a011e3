//! Graphics pipelines and compute kernels.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{GpuCompute, GpuPipeline};
use crate::device::Device;
use crate::error::GpuError;
use crate::shader::Shader;
use crate::types::{Capability, Cull, DepthTest, PipelineState, StateGroup, Transparency};

/// A shader plus its fixed-function state.
///
/// Each setter regenerates only the backend state object its field belongs
/// to. Binding goes through the device's state cache, so re-binding an
/// unchanged pipeline costs nothing.
pub struct Pipeline {
    device: Arc<Device>,
    id: u64,
    shader: Arc<Shader>,
    state: Mutex<PipelineState>,
    gpu: GpuPipeline,
}

impl Pipeline {
    pub(crate) fn new(device: Arc<Device>, id: u64, shader: Arc<Shader>) -> Result<Self, GpuError> {
        let state = PipelineState::default();
        let gpu = device
            .backend()
            .create_pipeline(shader.gpu(), shader.meta(), &state)?;
        Ok(Self {
            device,
            id,
            shader,
            state: Mutex::new(state),
            gpu,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn shader(&self) -> &Arc<Shader> {
        &self.shader
    }

    /// Snapshot of the current fixed-function state.
    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    pub(crate) fn gpu(&self) -> &GpuPipeline {
        &self.gpu
    }

    fn update(&self, group: StateGroup, apply: impl FnOnce(&mut PipelineState)) {
        let mut state = self.state.lock();
        let before = *state;
        apply(&mut state);
        if *state != before {
            self.device.backend().update_pipeline(&self.gpu, &state, group);
        }
    }

    pub fn set_transparency(&self, transparency: Transparency) {
        self.update(StateGroup::Blend, |s| s.transparency = transparency);
    }

    pub fn set_cull(&self, cull: Cull) {
        self.update(StateGroup::Raster, |s| s.cull = cull);
    }

    pub fn set_wireframe(&self, wireframe: bool) {
        if wireframe && !self.device.capability(Capability::Wireframe) {
            report_warn!("Wireframe rendering isn't supported on this device");
            return;
        }
        self.update(StateGroup::Raster, |s| s.wireframe = wireframe);
    }

    pub fn set_scissor(&self, scissor: bool) {
        self.update(StateGroup::Raster, |s| s.scissor = scissor);
    }

    pub fn set_depth_test(&self, depth_test: DepthTest) {
        self.update(StateGroup::Depth, |s| s.depth_test = depth_test);
    }

    pub fn set_depth_write(&self, depth_write: bool) {
        self.update(StateGroup::Depth, |s| s.depth_write = depth_write);
    }

    pub fn transparency(&self) -> Transparency {
        self.state.lock().transparency
    }

    pub fn cull(&self) -> Cull {
        self.state.lock().cull
    }

    pub fn wireframe(&self) -> bool {
        self.state.lock().wireframe
    }

    pub fn scissor(&self) -> bool {
        self.state.lock().scissor
    }

    pub fn depth_test(&self) -> DepthTest {
        self.state.lock().depth_test
    }

    pub fn depth_write(&self) -> bool {
        self.state.lock().depth_write
    }

    /// Make this pipeline current for the following draws.
    pub fn bind(&self) {
        self.device.bind_pipeline(self);
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        log::trace!("Pipeline {}: destroyed", self.id);
        self.device.forget(self.id);
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("shader", &self.shader.name())
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// A compute kernel.
pub struct Compute {
    device: Arc<Device>,
    id: u64,
    shader: Arc<Shader>,
    gpu: GpuCompute,
}

impl Compute {
    pub(crate) fn new(device: Arc<Device>, id: u64, shader: Arc<Shader>) -> Result<Self, GpuError> {
        let gpu = device.backend().create_compute(shader.gpu(), shader.meta())?;
        Ok(Self {
            device,
            id,
            shader,
            gpu,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn shader(&self) -> &Arc<Shader> {
        &self.shader
    }

    pub(crate) fn gpu(&self) -> &GpuCompute {
        &self.gpu
    }

    /// Make this kernel current for the following dispatches.
    pub fn bind(&self) {
        self.device.bind_compute(self);
    }
}

impl Drop for Compute {
    fn drop(&mut self) {
        self.device.forget(self.id);
    }
}

impl std::fmt::Debug for Compute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compute")
            .field("id", &self.id)
            .field("shader", &self.shader.name())
            .finish()
    }
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);
static_assertions::assert_impl_all!(Compute: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendType, DeviceParameters};
    use crate::shader::ShaderMeta;

    fn setup() -> (Arc<Device>, Arc<Shader>) {
        let device = Device::new(DeviceParameters::new().with_backend(BackendType::Null)).unwrap();
        let shader = device
            .create_shader(
                Arc::new(ShaderMeta::new("flat")),
                Some(b"vs".as_slice()),
                Some(b"ps".as_slice()),
                None,
            )
            .unwrap();
        (device, shader)
    }

    #[test]
    fn test_pipeline_defaults() {
        let (device, shader) = setup();
        let pipeline = device.create_pipeline(&shader).unwrap();
        assert_eq!(pipeline.transparency(), Transparency::None);
        assert_eq!(pipeline.cull(), Cull::Back);
        assert_eq!(pipeline.depth_test(), DepthTest::Less);
        assert!(pipeline.depth_write());
        assert!(!pipeline.wireframe());
        assert!(!pipeline.scissor());
    }

    #[test]
    fn test_setter_updates_only_its_group() {
        let (device, shader) = setup();
        let pipeline = device.create_pipeline(&shader).unwrap();
        let before = device.backend_stats().unwrap();

        pipeline.set_cull(Cull::None);
        pipeline.set_cull(Cull::None);
        let after = device.backend_stats().unwrap();
        assert_eq!(after.raster_states, before.raster_states + 1);
        assert_eq!(after.blend_states, before.blend_states);
        assert_eq!(after.depth_states, before.depth_states);
    }

    #[test]
    fn test_rebind_costs_nothing() {
        let (device, shader) = setup();
        let pipeline = device.create_pipeline(&shader).unwrap();
        pipeline.bind();
        let first = device.backend_stats().unwrap().state_calls;
        assert!(first > 0);

        pipeline.bind();
        assert_eq!(device.backend_stats().unwrap().state_calls, first);
    }

    #[test]
    fn test_compute_needs_compute_stage() {
        let (device, shader) = setup();
        assert!(matches!(device.create_compute(&shader), Err(GpuError::Misuse(_))));

        let kernel = device
            .create_shader(Arc::new(ShaderMeta::new("blur")), None, None, Some(b"cs".as_slice()))
            .unwrap();
        let compute = device.create_compute(&kernel).unwrap();
        compute.bind();
        compute.bind();
        assert_eq!(device.backend_stats().unwrap().state_calls, 1);
    }
}

//! wgpu GPU backend implementation.
//!
//! This backend uses wgpu for cross-platform GPU access, supporting
//! Vulkan, Metal, DX12 and OpenGL. Shader stages are SPIR-V; their
//! descriptor sets follow the register classes described in the `reflect`
//! module.
//!
//! The immediate-mode context is emulated by a [`Frame`](frame::Frame)
//! that records draws against the bound target and replays them as render
//! passes.

mod conversion;
mod frame;
mod mipgen;
mod reflect;
mod resources;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{AdapterSelector, DeviceParameters};
use crate::error::GpuError;
use crate::format::TexFormat;
use crate::shader::ShaderMeta;
use crate::swapchain::SwapchainWindow;
use crate::types::{
    Bind, BufferDesc, BufferSlot, Capability, PipelineState, Rect, RegisterType, SamplerSettings,
    ShaderLanguage, StageBits, StateChange, StateGroup, TextureDesc,
};

use self::conversion::{
    convert_backends, convert_sampler, convert_texture_format, convert_texture_format_back,
};
use self::frame::{Bound, BoundTarget, Frame, TargetView};
use self::mipgen::MipGenerator;
use self::reflect::{GROUP_CONSTANT, GROUP_READ_WRITE, GROUP_RESOURCE, GROUP_SAMPLER};
use self::resources::{OwnedTexture, TargetKey, TextureKind, pad_to_copy_alignment};

pub use self::resources::{WgpuBuffer, WgpuCompute, WgpuPipeline, WgpuShader, WgpuSwapchain, WgpuTexture};

use super::{
    GpuBackend, GpuBuffer, GpuCompute, GpuPipeline, GpuShader, GpuSwapchain, GpuTexture,
    NativeFormat, NativeTexture, TargetRef,
};

/// Features requested whenever the adapter offers them.
const OPTIONAL_FEATURES: wgpu::Features = wgpu::Features::TEXTURE_COMPRESSION_BC
    .union(wgpu::Features::TEXTURE_COMPRESSION_ETC2)
    .union(wgpu::Features::TEXTURE_COMPRESSION_ASTC)
    .union(wgpu::Features::POLYGON_MODE_LINE)
    .union(wgpu::Features::MULTIVIEW)
    .union(wgpu::Features::FLOAT32_FILTERABLE);

/// wgpu-based GPU backend.
pub struct WgpuBackend {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    labels: bool,
    frame: Mutex<Frame>,
    /// Error scopes are per device, so scoped calls are serialized.
    scope_lock: Mutex<()>,
    samplers: Mutex<HashMap<SamplerSettings, Arc<wgpu::Sampler>>>,
    mipgen: MipGenerator,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .finish()
    }
}

impl WgpuBackend {
    /// Create a backend on the adapter `params` selects.
    pub fn new(params: &DeviceParameters) -> Result<Self, GpuError> {
        let backends = convert_backends(params.wgpu_backend);

        let mut flags = wgpu::InstanceFlags::default();
        if params.validation {
            flags |= wgpu::InstanceFlags::VALIDATION;
        }
        if params.debug {
            flags |= wgpu::InstanceFlags::DEBUG;
        }
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            flags,
            ..Default::default()
        });

        let adapter = match &params.adapter {
            AdapterSelector::Default => pollster::block_on(instance.request_adapter(
                &wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                },
            )),
            selector => instance
                .enumerate_adapters(backends)
                .into_iter()
                .enumerate()
                .find(|(i, adapter)| selector.matches(*i, &adapter.get_info().name))
                .map(|(_, adapter)| adapter),
        }
        .ok_or_else(|| {
            GpuError::DeviceInitFailed(format!("no adapter matches {:?}", params.adapter))
        })?;

        let info = adapter.get_info();
        log::info!("wgpu adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: params.label(&params.app_name),
                required_features: adapter.features() & OPTIONAL_FEATURES,
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|e| GpuError::DeviceInitFailed(format!("device creation failed: {e}")))?;

        device.on_uncaptured_error(Box::new(|error| {
            report_critical!("wgpu: {error}");
        }));

        let mipgen = MipGenerator::new(&device);
        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            labels: params.debug,
            frame: Mutex::new(Frame::default()),
            scope_lock: Mutex::new(()),
            samplers: Mutex::new(HashMap::new()),
            mipgen,
        })
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get the wgpu queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub(super) fn label<'a>(&self, label: &'a str) -> Option<&'a str> {
        self.labels.then_some(label)
    }

    /// Run `f` inside a validation error scope.
    pub(super) fn scoped<T>(&self, what: &str, f: impl FnOnce() -> T) -> Result<T, GpuError> {
        let _guard = self.scope_lock.lock();
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(GpuError::ResourceCreationFailed(format!("{what}: {error}"))),
            None => Ok(value),
        }
    }

    fn sampler(&self, settings: &SamplerSettings) -> Arc<wgpu::Sampler> {
        let mut samplers = self.samplers.lock();
        let sampler = samplers
            .entry(*settings)
            .or_insert_with(|| Arc::new(self.device.create_sampler(&convert_sampler(settings))));
        Arc::clone(sampler)
    }

    pub(super) fn default_sampler(&self) -> Arc<wgpu::Sampler> {
        self.sampler(&SamplerSettings::default())
    }

    pub(super) fn hardware_mips(&self, desc: &TextureDesc) -> bool {
        desc.multisample <= 1
            && convert_texture_format(desc.format)
                .is_some_and(|format| mipgen::can_blit(&self.adapter, format))
    }

    /// Submit recorded draws so later queue operations see their results.
    fn flush(&self) {
        self.frame.lock().flush(self);
    }

    fn resolve_target(&self, target: &TargetRef<'_>) -> Option<BoundTarget> {
        let color = target.color.as_wgpu()?;
        let (w, h) = crate::format::mip_dimensions(target.desc.width, target.desc.height, target.mip);

        match &color.kind {
            TextureKind::Surface(surface) => Some(BoundTarget {
                layers: vec![(TargetView::Surface(Arc::clone(surface)), self.depth_view(target, 0))],
                key: TargetKey {
                    color: surface.view_format,
                    depth: self.depth_format(target),
                    samples: 1,
                },
                size: (w, h),
            }),
            TextureKind::Owned(owned) => {
                let layers: Vec<u32> = if target.layer < 0 {
                    (0..target.desc.array_count).collect()
                } else {
                    vec![target.layer as u32]
                };
                let layers = layers
                    .into_iter()
                    .filter_map(|layer| {
                        let view = owned.target_view(layer, target.mip)?;
                        Some((TargetView::View(Arc::clone(view)), self.depth_view(target, layer)))
                    })
                    .collect::<Vec<_>>();
                if layers.is_empty() {
                    report_warn!("Render target has no renderable views");
                    return None;
                }
                Some(BoundTarget {
                    layers,
                    key: TargetKey {
                        color: owned.format,
                        depth: self.depth_format(target),
                        samples: owned.samples,
                    },
                    size: (w, h),
                })
            }
        }
    }

    fn depth_owned<'a>(&self, target: &'a TargetRef<'_>) -> Option<(&'a OwnedTexture, &'a TextureDesc)> {
        let (depth, desc) = target.depth?;
        depth.as_wgpu()?.owned().map(|owned| (owned, desc))
    }

    fn depth_view(&self, target: &TargetRef<'_>, layer: u32) -> Option<Arc<wgpu::TextureView>> {
        let (owned, desc) = self.depth_owned(target)?;
        let layer = layer.min(desc.array_count.saturating_sub(1));
        owned.target_view(layer, 0).cloned()
    }

    fn depth_format(&self, target: &TargetRef<'_>) -> Option<wgpu::TextureFormat> {
        self.depth_owned(target).map(|(owned, _)| owned.format)
    }
}

fn wgpu_buffer(buffer: &GpuBuffer) -> Option<&WgpuBuffer> {
    let buffer = buffer.as_wgpu();
    if buffer.is_none() {
        log::warn!("WgpuBackend: buffer belongs to another backend");
    }
    buffer
}

fn wgpu_texture(texture: &GpuTexture) -> Option<&WgpuTexture> {
    let texture = texture.as_wgpu();
    if texture.is_none() {
        log::warn!("WgpuBackend: texture belongs to another backend");
    }
    texture
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn adapter_name(&self) -> String {
        self.adapter.get_info().name
    }

    fn shader_language(&self) -> ShaderLanguage {
        ShaderLanguage::Spirv
    }

    fn capability(&self, capability: Capability) -> bool {
        let features = self.device.features();
        match capability {
            Capability::TexLayerSelect => true,
            Capability::Wireframe => features.contains(wgpu::Features::POLYGON_MODE_LINE),
            Capability::FmtAstc => features.contains(wgpu::Features::TEXTURE_COMPRESSION_ASTC),
            Capability::Multiview => features.contains(wgpu::Features::MULTIVIEW),
            Capability::TiledMultisample
            | Capability::MultiviewTiledMultisample
            | Capability::FmtPvrtc1
            | Capability::FmtPvrtc2
            | Capability::FmtAtc => false,
        }
    }

    fn probe_format(&self, format: TexFormat) -> bool {
        let Some(native) = convert_texture_format(format) else {
            return false;
        };
        if !self.device.features().contains(native.required_features()) {
            return false;
        }
        let block = format.block_px();
        let usage = if format.is_depth() {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
        };
        self.scoped("format probe", || {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: None,
                size: wgpu::Extent3d {
                    width: block,
                    height: block,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: native,
                usage,
                view_formats: &[],
            })
        })
        .map(|texture| texture.destroy())
        .is_ok()
    }

    fn format_to_native(&self, format: TexFormat) -> Option<NativeFormat> {
        convert_texture_format(format).map(NativeFormat::Wgpu)
    }

    #[allow(unreachable_patterns)]
    fn format_from_native(&self, native: NativeFormat) -> TexFormat {
        match native {
            NativeFormat::Wgpu(format) => convert_texture_format_back(format),
            _ => TexFormat::None,
        }
    }

    fn begin_frame(&self) {
        log::trace!("WgpuBackend: begin frame");
        self.flush();
    }

    // ---- buffers ----

    fn create_buffer(&self, desc: &BufferDesc, data: Option<&[u8]>) -> Result<GpuBuffer, GpuError> {
        log::trace!("WgpuBackend: creating {:?} buffer ({} bytes)", desc.ty, desc.size());
        Ok(GpuBuffer::Wgpu(self.new_buffer(desc, data)?))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, data: &[u8]) {
        let Some(buffer) = wgpu_buffer(buffer) else {
            return;
        };
        self.flush();
        self.queue
            .write_buffer(&buffer.buffer, 0, &pad_to_copy_alignment(data));
    }

    fn read_buffer(&self, buffer: &GpuBuffer, out: &mut [u8]) -> Result<(), GpuError> {
        let buffer = buffer
            .as_wgpu()
            .ok_or_else(|| GpuError::Misuse("buffer belongs to another backend".into()))?;
        if out.len() as u64 != buffer.size {
            return Err(GpuError::Misuse(format!(
                "readback size {} does not match buffer size {}",
                out.len(),
                buffer.size
            )));
        }
        self.flush();
        let size = buffer.buffer.size();
        let bytes = self.read_back(size, |encoder, staging| {
            encoder.copy_buffer_to_buffer(&buffer.buffer, 0, staging, 0, size);
        })?;
        out.copy_from_slice(&bytes[..out.len()]);
        Ok(())
    }

    // ---- textures ----

    fn create_texture(&self, desc: &TextureDesc, data: &[&[u8]]) -> Result<GpuTexture, GpuError> {
        log::trace!(
            "WgpuBackend: creating {:?} texture {}x{}x{} ({:?}, {} mips)",
            desc.ty,
            desc.width,
            desc.height,
            desc.array_count,
            desc.format,
            desc.mip_count
        );
        if !data.is_empty() {
            self.flush();
        }
        Ok(GpuTexture::Wgpu(self.new_texture(desc, data)?))
    }

    fn write_texture(&self, texture: &GpuTexture, desc: &TextureDesc, data: &[&[u8]]) {
        let Some(owned) = wgpu_texture(texture).and_then(WgpuTexture::owned) else {
            return;
        };
        self.flush();
        self.upload(owned, desc, data);
    }

    fn supports_hardware_mips(&self, desc: &TextureDesc) -> bool {
        self.hardware_mips(desc)
    }

    fn generate_mips(&self, texture: &GpuTexture, desc: &TextureDesc) {
        let Some(owned) = wgpu_texture(texture).and_then(WgpuTexture::owned) else {
            return;
        };
        self.flush();
        self.mipgen.generate(&self.device, &self.queue, owned, desc);
    }

    fn read_texture(
        &self,
        texture: &GpuTexture,
        desc: &TextureDesc,
        layer: u32,
        mip: u32,
        out: &mut [u8],
    ) -> Result<(), GpuError> {
        let owned = texture
            .as_wgpu()
            .and_then(WgpuTexture::owned)
            .ok_or_else(|| GpuError::Unsupported("texture can't be read back".into()))?;
        self.flush();
        self.read_mip(owned, desc, layer, mip, out)
    }

    fn set_sampler(&self, texture: &GpuTexture, sampler: &SamplerSettings) {
        if let Some(texture) = wgpu_texture(texture) {
            *texture.sampler.lock() = self.sampler(sampler);
        }
    }

    unsafe fn adopt_texture(
        &self,
        native: NativeTexture,
        desc: &TextureDesc,
        layer: Option<u32>,
    ) -> Result<(GpuTexture, TextureDesc), GpuError> {
        #[allow(unreachable_patterns)]
        let NativeTexture::Wgpu(texture) = native else {
            return Err(GpuError::Misuse("native texture belongs to another backend".into()));
        };

        let mut adopted = *desc;
        adopted.format = match desc.format {
            TexFormat::None => convert_texture_format_back(texture.format()),
            format => format,
        };
        if adopted.format == TexFormat::None {
            return Err(GpuError::Unsupported(format!(
                "native format {:?} has no portable equivalent",
                texture.format()
            )));
        }
        adopted.width = texture.width();
        adopted.height = texture.height();
        (adopted.array_start, adopted.array_count) =
            super::adopted_layers(layer, texture.depth_or_array_layers().max(1))?;
        adopted.multisample = texture.sample_count().max(1);
        adopted.mip_count = texture.mip_level_count().max(1);
        adopted.mips = if adopted.mip_count > 1 {
            crate::types::MipPolicy::Generate
        } else {
            crate::types::MipPolicy::None
        };

        let owned = OwnedTexture::with_layers(texture, desc.ty, adopted.array_start, adopted.array_count);
        Ok((
            GpuTexture::Wgpu(WgpuTexture {
                kind: TextureKind::Owned(owned),
                sampler: Mutex::new(self.default_sampler()),
            }),
            adopted,
        ))
    }

    // ---- shaders and pipelines ----

    fn create_shader(
        &self,
        meta: &ShaderMeta,
        stages: &[(StageBits, &[u8])],
    ) -> Result<GpuShader, GpuError> {
        Ok(GpuShader::Wgpu(self.new_shader(meta, stages)?))
    }

    fn create_pipeline(
        &self,
        shader: &GpuShader,
        meta: &ShaderMeta,
        state: &PipelineState,
    ) -> Result<GpuPipeline, GpuError> {
        let shader = shader
            .as_wgpu()
            .ok_or_else(|| GpuError::Misuse("shader belongs to another backend".into()))?;
        if shader.0.vertex.is_none() || shader.0.pixel.is_none() {
            return Err(GpuError::Misuse(format!(
                "{}: pipeline needs vertex and pixel stages",
                meta.name
            )));
        }
        // Render pipelines depend on the target, so they are built at draw time.
        Ok(GpuPipeline::Wgpu(WgpuPipeline(Arc::new(resources::PipelineShared {
            shader: Arc::clone(&shader.0),
            state: Mutex::new(*state),
            variants: Mutex::new(HashMap::new()),
        }))))
    }

    fn update_pipeline(&self, pipeline: &GpuPipeline, state: &PipelineState, group: StateGroup) {
        let Some(pipeline) = pipeline.as_wgpu() else {
            return;
        };
        log::trace!("WgpuBackend: pipeline '{}' {group:?} state changed", pipeline.0.shader.name);
        *pipeline.0.state.lock() = *state;
        pipeline.0.variants.lock().clear();
    }

    fn create_compute(&self, shader: &GpuShader, _meta: &ShaderMeta) -> Result<GpuCompute, GpuError> {
        let shader = shader
            .as_wgpu()
            .ok_or_else(|| GpuError::Misuse("shader belongs to another backend".into()))?;
        Ok(GpuCompute::Wgpu(self.new_compute(shader)?))
    }

    // ---- swapchains ----

    fn create_swapchain(
        &self,
        window: Arc<dyn SwapchainWindow>,
        format: TexFormat,
        width: u32,
        height: u32,
    ) -> Result<GpuSwapchain, GpuError> {
        let surface = self
            .instance
            .create_surface(window)
            .map_err(|e| GpuError::ResourceCreationFailed(format!("surface: {e}")))?;
        log::debug!("WgpuBackend: creating swapchain {width}x{height} ({format:?})");
        Ok(GpuSwapchain::Wgpu(self.new_surface(surface, format, width, height)?))
    }

    fn resize_swapchain(&self, swapchain: &GpuSwapchain, width: u32, height: u32) -> Result<(), GpuError> {
        let swapchain = swapchain
            .as_wgpu()
            .ok_or_else(|| GpuError::Misuse("swapchain belongs to another backend".into()))?;
        self.flush();
        self.scoped("surface resize", || swapchain.0.resize(&self.device, width, height))
    }

    fn swapchain_target(&self, swapchain: &GpuSwapchain) -> Result<GpuTexture, GpuError> {
        let swapchain = swapchain
            .as_wgpu()
            .ok_or_else(|| GpuError::Misuse("swapchain belongs to another backend".into()))?;
        Ok(GpuTexture::Wgpu(WgpuTexture {
            kind: TextureKind::Surface(Arc::clone(&swapchain.0)),
            sampler: Mutex::new(self.default_sampler()),
        }))
    }

    fn present(&self, swapchain: &GpuSwapchain) {
        let Some(swapchain) = swapchain.as_wgpu() else {
            return;
        };
        self.flush();
        swapchain.0.present();
    }

    // ---- immediate context ----

    fn bind_target(&self, target: Option<TargetRef<'_>>) {
        let bound = target.as_ref().and_then(|t| self.resolve_target(t));
        self.frame.lock().set_target(self, bound);
    }

    fn set_viewport(&self, rect: Rect) {
        self.frame.lock().set_viewport(rect);
    }

    fn set_scissor(&self, rect: Rect) {
        self.frame.lock().set_scissor(rect);
    }

    fn clear(&self, color: Option<[f32; 4]>, depth: bool) {
        self.frame.lock().clear(self, color, depth);
    }

    fn apply_state(&self, changes: &[StateChange]) {
        let mut frame = self.frame.lock();
        for change in changes {
            if let StateChange::Scissor(enabled) = change {
                frame.set_scissor_enabled(*enabled);
            }
        }
    }

    fn bind_pipeline(&self, pipeline: &GpuPipeline, changes: &[StateChange]) {
        let Some(pipeline) = pipeline.as_wgpu() else {
            return;
        };
        self.apply_state(changes);
        self.frame.lock().set_pipeline(Arc::clone(&pipeline.0));
    }

    fn bind_compute(&self, compute: &GpuCompute) {
        if let Some(compute) = compute.as_wgpu() {
            self.frame.lock().set_compute(Arc::clone(&compute.0));
        }
    }

    fn bind_buffer(&self, buffer: &GpuBuffer, slot: BufferSlot) {
        let Some(buffer) = wgpu_buffer(buffer) else {
            return;
        };
        let mut frame = self.frame.lock();
        let bound = Bound::Buffer(Arc::clone(&buffer.buffer));
        match slot {
            BufferSlot::Vertex { slot: 0, .. } => frame.set_vertex(Arc::clone(&buffer.buffer)),
            BufferSlot::Vertex { slot, .. } => {
                report_warn!("Only vertex slot 0 is supported, ignoring slot {slot}");
            }
            BufferSlot::Index => frame.set_index(Arc::clone(&buffer.buffer), buffer.index_format()),
            BufferSlot::Constant { slot, .. } => frame.bind(GROUP_CONSTANT, slot as u32, bound),
            BufferSlot::Resource { slot, .. } => frame.bind(GROUP_RESOURCE, slot as u32, bound),
            BufferSlot::ReadWrite { slot, .. } => frame.bind(GROUP_READ_WRITE, slot as u32, bound),
        }
    }

    fn bind_texture(&self, texture: &GpuTexture, bind: Bind) {
        let Some(texture) = wgpu_texture(texture) else {
            return;
        };
        let Some(owned) = texture.owned() else {
            report_warn!("A swapchain image can't be bound as a texture");
            return;
        };
        let slot = bind.slot as u32;
        let mut frame = self.frame.lock();
        match bind.register_type {
            RegisterType::ReadWrite => {
                // Storage bindings see a single mip.
                let view = owned.target_view(0, 0).unwrap_or(&owned.view);
                frame.bind(GROUP_READ_WRITE, slot, Bound::View(Arc::clone(view)));
            }
            _ => {
                frame.bind(GROUP_RESOURCE, slot, Bound::View(Arc::clone(&owned.view)));
                frame.bind(GROUP_SAMPLER, slot, Bound::Sampler(Arc::clone(&texture.sampler.lock())));
            }
        }
    }

    fn draw(&self, index_start: u32, index_base: i32, index_count: u32, instances: u32) {
        self.frame
            .lock()
            .draw(self, index_start, index_base, index_count, instances);
    }

    fn dispatch(&self, x: u32, y: u32, z: u32) {
        self.frame.lock().dispatch(self, x, y, z);
    }
}

static_assertions::assert_impl_all!(WgpuBackend: Send, Sync);

//! GPU backend abstraction layer.
//!
//! Each backend implements [`GpuBackend`], which the [`Device`](crate::Device)
//! drives with already-validated calls. Resource handles are enums with one
//! variant per compiled backend, so front-end resources stay non-generic.
//!
//! # Available Backends
//!
//! - `null` (always compiled): in-memory backend that models a bound-state
//!   driver and counts every call it receives
//! - `wgpu-backend`: explicit-object backend using wgpu, emulating the
//!   immediate-mode API by recording render passes

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_impl;

pub mod null;

use std::sync::Arc;

use crate::config::{BackendType, DeviceParameters};
use crate::error::GpuError;
use crate::format::TexFormat;
use crate::shader::ShaderMeta;
use crate::swapchain::SwapchainWindow;
use crate::types::{
    Bind, BufferDesc, BufferSlot, Capability, PipelineState, Rect, SamplerSettings, ShaderLanguage,
    StageBits, StateChange, StateGroup, TextureDesc,
};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident { Null($null:ty), Wgpu($wgpu:ty) }) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub enum $name {
            Null($null),
            #[cfg(feature = "wgpu-backend")]
            Wgpu($wgpu),
        }

        impl $name {
            #[allow(unreachable_patterns)]
            pub(crate) fn as_null(&self) -> Option<&$null> {
                match self {
                    Self::Null(handle) => Some(handle),
                    _ => None,
                }
            }

            #[cfg(feature = "wgpu-backend")]
            #[allow(unreachable_patterns)]
            pub(crate) fn as_wgpu(&self) -> Option<&$wgpu> {
                match self {
                    Self::Wgpu(handle) => Some(handle),
                    _ => None,
                }
            }
        }
    };
}

handle! {
    /// Handle to a GPU buffer.
    GpuBuffer { Null(null::NullBuffer), Wgpu(wgpu_impl::WgpuBuffer) }
}

handle! {
    /// Handle to a GPU texture and its views.
    GpuTexture { Null(null::NullTexture), Wgpu(wgpu_impl::WgpuTexture) }
}

handle! {
    /// Handle to compiled shader stages.
    GpuShader { Null(null::NullShader), Wgpu(wgpu_impl::WgpuShader) }
}

handle! {
    /// Handle to a graphics pipeline and its state objects.
    GpuPipeline { Null(null::NullPipeline), Wgpu(wgpu_impl::WgpuPipeline) }
}

handle! {
    /// Handle to a compute kernel.
    GpuCompute { Null(null::NullCompute), Wgpu(wgpu_impl::WgpuCompute) }
}

handle! {
    /// Handle to a presentable surface.
    GpuSwapchain { Null(null::NullSwapchain), Wgpu(wgpu_impl::WgpuSwapchain) }
}

/// A texture created outside this layer, handed over for adoption.
#[derive(Debug)]
pub enum NativeTexture {
    Null(null::NullNativeTexture),
    #[cfg(feature = "wgpu-backend")]
    Wgpu(wgpu::Texture),
}

/// A backend's own texture format value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeFormat {
    /// Direct3D-compatible format number.
    Null(u32),
    #[cfg(feature = "wgpu-backend")]
    Wgpu(wgpu::TextureFormat),
}

/// Render target handed to [`GpuBackend::bind_target`].
#[derive(Debug, Clone, Copy)]
pub struct TargetRef<'a> {
    pub color: &'a GpuTexture,
    pub desc: &'a TextureDesc,
    /// Array layer, or -1 for every layer at once.
    pub layer: i32,
    pub mip: u32,
    pub depth: Option<(&'a GpuTexture, &'a TextureDesc)>,
}

/// Call counters exposed by instrumented backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendStats {
    /// Individual state-change calls, one per changed field.
    pub state_calls: u64,
    pub raster_states: u64,
    pub blend_states: u64,
    pub depth_states: u64,
    pub buffer_binds: u64,
    pub texture_binds: u64,
    pub target_binds: u64,
    pub clears: u64,
    pub draws: u64,
    pub dispatches: u64,
    pub presents: u64,
    pub uploads: u64,
}

/// GPU backend trait for abstracting different GPU APIs.
///
/// Every method is blocking. Methods that mutate handles take `&self` and
/// rely on the handle's own interior locking.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Name of the adapter the device was created on.
    fn adapter_name(&self) -> String;

    /// Language of the shader blobs this backend consumes.
    fn shader_language(&self) -> ShaderLanguage;

    fn capability(&self, capability: Capability) -> bool;

    /// Try to create a 1x1 texture of `format` and report success.
    fn probe_format(&self, format: TexFormat) -> bool;

    /// The backend's value for `format`, or `None` when it has no equivalent.
    fn format_to_native(&self, format: TexFormat) -> Option<NativeFormat>;

    /// Best-effort inverse of [`format_to_native`](Self::format_to_native).
    fn format_from_native(&self, native: NativeFormat) -> TexFormat;

    /// Call counters, for backends that keep them.
    fn stats(&self) -> Option<BackendStats> {
        None
    }

    /// Start of a frame's command stream.
    fn begin_frame(&self);

    // ---- buffers ----

    fn create_buffer(&self, desc: &BufferDesc, data: Option<&[u8]>) -> Result<GpuBuffer, GpuError>;

    /// Replace the whole contents of a dynamic buffer.
    fn write_buffer(&self, buffer: &GpuBuffer, data: &[u8]);

    /// Blocking readback into `out`, which must match the buffer size.
    fn read_buffer(&self, buffer: &GpuBuffer, out: &mut [u8]) -> Result<(), GpuError>;

    // ---- textures ----

    /// Create backing storage.
    ///
    /// `data` holds one slice per array layer with that layer's mips laid out
    /// contiguously, or is empty for an uninitialized texture.
    fn create_texture(&self, desc: &TextureDesc, data: &[&[u8]]) -> Result<GpuTexture, GpuError>;

    /// Re-upload every layer and mip in the layout of `create_texture`.
    fn write_texture(&self, texture: &GpuTexture, desc: &TextureDesc, data: &[&[u8]]);

    /// Whether [`generate_mips`](Self::generate_mips) can fill the chain.
    fn supports_hardware_mips(&self, desc: &TextureDesc) -> bool;

    /// Fill mips 1.. from mip 0 on the GPU.
    fn generate_mips(&self, texture: &GpuTexture, desc: &TextureDesc);

    /// Blocking readback of one (layer, mip) into `out`.
    fn read_texture(
        &self,
        texture: &GpuTexture,
        desc: &TextureDesc,
        layer: u32,
        mip: u32,
        out: &mut [u8],
    ) -> Result<(), GpuError>;

    fn set_sampler(&self, texture: &GpuTexture, sampler: &SamplerSettings);

    /// Wrap a texture created outside this layer.
    ///
    /// `desc` carries the caller's type, format override and size; the
    /// returned descriptor has mips, samples and format filled in from the
    /// native object.
    ///
    /// # Safety
    ///
    /// `native` must be a live texture created on the same device, and must
    /// not be destroyed by its creator while the adopted handle is alive.
    ///
    /// With `layer`, only that array layer of `native` is wrapped and the
    /// returned descriptor has one layer starting there.
    unsafe fn adopt_texture(
        &self,
        native: NativeTexture,
        desc: &TextureDesc,
        layer: Option<u32>,
    ) -> Result<(GpuTexture, TextureDesc), GpuError>;

    // ---- shaders and pipelines ----

    /// Compile stage blobs. `stages` holds exactly the stages present.
    fn create_shader(
        &self,
        meta: &ShaderMeta,
        stages: &[(StageBits, &[u8])],
    ) -> Result<GpuShader, GpuError>;

    fn create_pipeline(
        &self,
        shader: &GpuShader,
        meta: &ShaderMeta,
        state: &PipelineState,
    ) -> Result<GpuPipeline, GpuError>;

    /// Regenerate the state object for `group` after a setter changed it.
    fn update_pipeline(&self, pipeline: &GpuPipeline, state: &PipelineState, group: StateGroup);

    fn create_compute(&self, shader: &GpuShader, meta: &ShaderMeta) -> Result<GpuCompute, GpuError>;

    // ---- swapchains ----

    fn create_swapchain(
        &self,
        window: Arc<dyn SwapchainWindow>,
        format: TexFormat,
        width: u32,
        height: u32,
    ) -> Result<GpuSwapchain, GpuError>;

    fn resize_swapchain(&self, swapchain: &GpuSwapchain, width: u32, height: u32) -> Result<(), GpuError>;

    /// Texture handle that renders into the swapchain's current image.
    fn swapchain_target(&self, swapchain: &GpuSwapchain) -> Result<GpuTexture, GpuError>;

    fn present(&self, swapchain: &GpuSwapchain);

    // ---- immediate context ----

    /// Redirect rendering. `None` unbinds every target.
    fn bind_target(&self, target: Option<TargetRef<'_>>);

    fn set_viewport(&self, rect: Rect);

    fn set_scissor(&self, rect: Rect);

    /// Clear the bound target's color and/or depth.
    fn clear(&self, color: Option<[f32; 4]>, depth: bool);

    /// Apply individual state changes outside a pipeline bind.
    fn apply_state(&self, changes: &[StateChange]);

    /// Make `pipeline` current. `changes` lists only the fields that differ
    /// from what is already applied.
    fn bind_pipeline(&self, pipeline: &GpuPipeline, changes: &[StateChange]);

    fn bind_compute(&self, compute: &GpuCompute);

    fn bind_buffer(&self, buffer: &GpuBuffer, slot: BufferSlot);

    /// Bind as a sampled texture, or as a storage texture for read-write binds.
    fn bind_texture(&self, texture: &GpuTexture, bind: Bind);

    fn draw(&self, index_start: u32, index_base: i32, index_count: u32, instances: u32);

    fn dispatch(&self, x: u32, y: u32, z: u32);
}

/// Layer range `(array_start, array_count)` an adopted texture covers.
pub(crate) fn adopted_layers(layer: Option<u32>, native_layers: u32) -> Result<(u32, u32), GpuError> {
    match layer {
        None => Ok((0, native_layers)),
        Some(layer) if layer < native_layers => Ok((layer, 1)),
        Some(layer) => Err(GpuError::Misuse(format!(
            "layer {layer} is out of range for a texture with {native_layers} layers"
        ))),
    }
}

/// Selects and creates the backend requested by `params`.
///
/// `Auto` tries wgpu first when it is compiled in and falls back to null.
pub fn create_backend(params: &DeviceParameters) -> Result<Arc<dyn GpuBackend>, GpuError> {
    match params.backend {
        BackendType::Null => {
            log::info!("Using null backend");
            Ok(Arc::new(null::NullBackend::new()))
        }
        BackendType::Wgpu => create_wgpu(params),
        BackendType::Auto => match create_wgpu(params) {
            Ok(backend) => Ok(backend),
            Err(e) => {
                log::warn!("Failed to create wgpu backend: {e}");
                log::info!("Using null backend");
                Ok(Arc::new(null::NullBackend::new()))
            }
        },
    }
}

#[cfg(feature = "wgpu-backend")]
fn create_wgpu(params: &DeviceParameters) -> Result<Arc<dyn GpuBackend>, GpuError> {
    let backend = wgpu_impl::WgpuBackend::new(params)?;
    log::info!("Using wgpu backend on {}", backend.adapter_name());
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "wgpu-backend"))]
fn create_wgpu(_params: &DeviceParameters) -> Result<Arc<dyn GpuBackend>, GpuError> {
    Err(GpuError::DeviceInitFailed(
        "wgpu backend not compiled in (enable the `wgpu-backend` feature)".to_string(),
    ))
}

/// Check if a real GPU backend is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "wgpu-backend")
}

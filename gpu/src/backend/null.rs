//! Null GPU backend.
//!
//! Keeps buffer and texture bytes in memory so uploads and readbacks
//! round-trip without a GPU, and behaves like a bound-state-machine driver:
//! every state change it receives is one counted call. Tests read the
//! counters through [`GpuBackend::stats`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::GpuError;
use crate::format::TexFormat;
use crate::shader::ShaderMeta;
use crate::swapchain::SwapchainWindow;
use crate::types::{
    Bind, BufferDesc, BufferSlot, Capability, MipPolicy, PipelineState, Rect, SamplerSettings,
    ShaderLanguage, StageBits, StateChange, StateGroup, TexType, TextureDesc, Usage,
};

use super::{
    BackendStats, GpuBackend, GpuBuffer, GpuCompute, GpuPipeline, GpuShader, GpuSwapchain,
    GpuTexture, NativeFormat, NativeTexture, TargetRef, adopted_layers,
};

// ============================================================================
// Native Formats
// ============================================================================

/// Direct3D-compatible format number for `format`, 0 when there is none.
pub fn format_to_native(format: TexFormat) -> u32 {
    match format {
        TexFormat::Rgba32 => 29,
        TexFormat::Rgba32Linear => 28,
        TexFormat::Bgra32 => 91,
        TexFormat::Bgra32Linear => 87,
        TexFormat::Rg11b10 => 26,
        TexFormat::Rgb10a2 => 24,
        TexFormat::Rgba64u => 11,
        TexFormat::Rgba64s => 13,
        TexFormat::Rgba64f => 10,
        TexFormat::Rgba128 => 2,
        TexFormat::R8 => 61,
        TexFormat::R16u => 56,
        TexFormat::R16s => 58,
        TexFormat::R16f => 54,
        TexFormat::R32 => 41,
        TexFormat::DepthStencil => 45,
        TexFormat::Depth32 => 40,
        TexFormat::Depth16 => 55,
        TexFormat::R8g8 => 49,
        TexFormat::Bc1RgbSrgb => 72,
        TexFormat::Bc1Rgb => 71,
        TexFormat::Bc3RgbaSrgb => 78,
        TexFormat::Bc3Rgba => 77,
        TexFormat::Bc4R => 80,
        TexFormat::Bc5Rg => 83,
        TexFormat::Bc7RgbaSrgb => 99,
        TexFormat::Bc7Rgba => 98,
        _ => 0,
    }
}

/// Inverse of [`format_to_native`]; unknown numbers map to `None`.
pub fn format_from_native(native: u32) -> TexFormat {
    TexFormat::ALL
        .into_iter()
        .find(|f| native != 0 && format_to_native(*f) == native)
        .unwrap_or(TexFormat::None)
}

// ============================================================================
// Handles
// ============================================================================

#[derive(Debug)]
pub struct NullBuffer {
    data: Mutex<Vec<u8>>,
}

#[derive(Debug)]
pub struct NullTexture {
    /// One contiguous mip chain per layer.
    layers: Arc<Mutex<Vec<Vec<u8>>>>,
    sampler: Mutex<SamplerSettings>,
}

impl NullTexture {
    fn new(desc: &TextureDesc, data: &[&[u8]]) -> Result<Self, GpuError> {
        let layer_size = desc.checked_layer_size()?;
        let layers = (0..desc.array_count as usize)
            .map(|i| match data.get(i) {
                Some(bytes) => {
                    let mut layer = bytes.to_vec();
                    layer.resize(layer_size, 0);
                    layer
                }
                None => vec![0; layer_size],
            })
            .collect();
        Ok(Self {
            layers: Arc::new(Mutex::new(layers)),
            sampler: Mutex::new(SamplerSettings::default()),
        })
    }

    /// Current sampler state.
    pub fn sampler(&self) -> SamplerSettings {
        *self.sampler.lock()
    }
}

#[derive(Debug)]
pub struct NullShader {
    stages: StageBits,
}

#[derive(Debug)]
pub struct NullPipeline {
    state: Mutex<PipelineState>,
}

impl NullPipeline {
    /// State as of the last create or update.
    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }
}

#[derive(Debug)]
pub struct NullCompute;

#[derive(Debug)]
pub struct NullSwapchain {
    format: TexFormat,
    size: Mutex<(u32, u32)>,
}

/// Stand-in for a texture created by foreign code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullNativeTexture {
    pub width: u32,
    pub height: u32,
    pub array_count: u32,
    pub multisample: u32,
    pub mip_count: u32,
    /// Direct3D-compatible format number.
    pub format: u32,
}

// ============================================================================
// Backend
// ============================================================================

#[derive(Debug, Default)]
struct Counters {
    state_calls: AtomicU64,
    raster_states: AtomicU64,
    blend_states: AtomicU64,
    depth_states: AtomicU64,
    buffer_binds: AtomicU64,
    texture_binds: AtomicU64,
    target_binds: AtomicU64,
    clears: AtomicU64,
    draws: AtomicU64,
    dispatches: AtomicU64,
    presents: AtomicU64,
    uploads: AtomicU64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

struct BoundTarget {
    layers: Arc<Mutex<Vec<Vec<u8>>>>,
    desc: TextureDesc,
    layer: i32,
    mip: u32,
}

/// Null GPU backend.
pub struct NullBackend {
    counters: Counters,
    target: Mutex<Option<BoundTarget>>,
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            counters: Counters::default(),
            target: Mutex::new(None),
        }
    }

    fn buffer<'a>(&self, buffer: &'a GpuBuffer) -> Option<&'a NullBuffer> {
        let handle = buffer.as_null();
        if handle.is_none() {
            log::error!("NullBackend: buffer belongs to another backend");
        }
        handle
    }

    fn texture<'a>(&self, texture: &'a GpuTexture) -> Option<&'a NullTexture> {
        let handle = texture.as_null();
        if handle.is_none() {
            log::error!("NullBackend: texture belongs to another backend");
        }
        handle
    }
}

/// Encode one texel of `color` in `format`, if the format is clearable.
fn encode_color(format: TexFormat, color: [f32; 4]) -> Option<Vec<u8>> {
    let unorm8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    Some(match format {
        TexFormat::Rgba32 | TexFormat::Rgba32Linear => color.map(unorm8).to_vec(),
        TexFormat::Bgra32 | TexFormat::Bgra32Linear => {
            [color[2], color[1], color[0], color[3]].map(unorm8).to_vec()
        }
        TexFormat::Rgba128 => bytemuck::cast_slice::<f32, u8>(color.as_slice()).to_vec(),
        TexFormat::R8 => vec![unorm8(color[0])],
        TexFormat::R32 => color[0].to_le_bytes().to_vec(),
        _ => return None,
    })
}

impl GpuBackend for NullBackend {
    fn name(&self) -> &'static str {
        "Null Backend"
    }

    fn adapter_name(&self) -> String {
        "RedLilium Null Adapter".to_string()
    }

    fn shader_language(&self) -> ShaderLanguage {
        ShaderLanguage::Hlsl
    }

    fn capability(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::TexLayerSelect | Capability::Wireframe | Capability::FmtAstc
        )
    }

    fn probe_format(&self, format: TexFormat) -> bool {
        !matches!(
            format,
            TexFormat::None
                | TexFormat::Pvrtc1RgbSrgb
                | TexFormat::Pvrtc1Rgb
                | TexFormat::Pvrtc1RgbaSrgb
                | TexFormat::Pvrtc1Rgba
                | TexFormat::Pvrtc2RgbaSrgb
                | TexFormat::Pvrtc2Rgba
                | TexFormat::AtcRgb
                | TexFormat::AtcRgba
        )
    }

    fn format_to_native(&self, format: TexFormat) -> Option<NativeFormat> {
        match format_to_native(format) {
            0 => None,
            value => Some(NativeFormat::Null(value)),
        }
    }

    #[allow(unreachable_patterns)]
    fn format_from_native(&self, native: NativeFormat) -> TexFormat {
        match native {
            NativeFormat::Null(value) => format_from_native(value),
            _ => TexFormat::None,
        }
    }

    fn stats(&self) -> Option<BackendStats> {
        let c = &self.counters;
        let get = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        Some(BackendStats {
            state_calls: get(&c.state_calls),
            raster_states: get(&c.raster_states),
            blend_states: get(&c.blend_states),
            depth_states: get(&c.depth_states),
            buffer_binds: get(&c.buffer_binds),
            texture_binds: get(&c.texture_binds),
            target_binds: get(&c.target_binds),
            clears: get(&c.clears),
            draws: get(&c.draws),
            dispatches: get(&c.dispatches),
            presents: get(&c.presents),
            uploads: get(&c.uploads),
        })
    }

    fn begin_frame(&self) {
        log::trace!("NullBackend: begin frame");
    }

    fn create_buffer(&self, desc: &BufferDesc, data: Option<&[u8]>) -> Result<GpuBuffer, GpuError> {
        let size = desc.size() as usize;
        log::trace!("NullBackend: creating {:?} buffer ({size} bytes)", desc.ty);
        let mut bytes = data.map(<[u8]>::to_vec).unwrap_or_default();
        bytes.resize(size, 0);
        Ok(GpuBuffer::Null(NullBuffer {
            data: Mutex::new(bytes),
        }))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, data: &[u8]) {
        if let Some(buffer) = self.buffer(buffer) {
            bump(&self.counters.uploads, 1);
            let mut bytes = buffer.data.lock();
            bytes.clear();
            bytes.extend_from_slice(data);
        }
    }

    fn read_buffer(&self, buffer: &GpuBuffer, out: &mut [u8]) -> Result<(), GpuError> {
        let buffer = self
            .buffer(buffer)
            .ok_or_else(|| GpuError::Misuse("buffer belongs to another backend".into()))?;
        let bytes = buffer.data.lock();
        if bytes.len() != out.len() {
            return Err(GpuError::Misuse(format!(
                "readback size {} does not match buffer size {}",
                out.len(),
                bytes.len()
            )));
        }
        out.copy_from_slice(&bytes);
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDesc, data: &[&[u8]]) -> Result<GpuTexture, GpuError> {
        if !self.probe_format(desc.format) {
            return Err(GpuError::FormatUnsupported(desc.format));
        }
        log::trace!(
            "NullBackend: creating {:?} texture {}x{}x{} ({:?}, {} mips)",
            desc.ty,
            desc.width,
            desc.height,
            desc.array_count,
            desc.format,
            desc.mip_count
        );
        Ok(GpuTexture::Null(NullTexture::new(desc, data)?))
    }

    fn write_texture(&self, texture: &GpuTexture, desc: &TextureDesc, data: &[&[u8]]) {
        if let Some(texture) = self.texture(texture) {
            let fresh = match NullTexture::new(desc, data) {
                Ok(fresh) => fresh,
                Err(e) => {
                    log::error!("NullBackend: dropping texture upload: {e}");
                    return;
                }
            };
            bump(&self.counters.uploads, 1);
            let layers = std::mem::take(&mut *fresh.layers.lock());
            *texture.layers.lock() = layers;
        }
    }

    fn supports_hardware_mips(&self, _desc: &TextureDesc) -> bool {
        false
    }

    fn generate_mips(&self, _texture: &GpuTexture, _desc: &TextureDesc) {
        log::warn!("NullBackend: hardware mip generation requested but not supported");
    }

    fn read_texture(
        &self,
        texture: &GpuTexture,
        desc: &TextureDesc,
        layer: u32,
        mip: u32,
        out: &mut [u8],
    ) -> Result<(), GpuError> {
        let texture = self
            .texture(texture)
            .ok_or_else(|| GpuError::Misuse("texture belongs to another backend".into()))?;
        let layers = texture.layers.lock();
        let bytes = desc
            .mip_offset(mip)
            .and_then(|start| layers.get(layer as usize)?.get(start..start.checked_add(out.len())?))
            .ok_or_else(|| GpuError::Misuse(format!("layer {layer} mip {mip} out of range")))?;
        out.copy_from_slice(bytes);
        Ok(())
    }

    fn set_sampler(&self, texture: &GpuTexture, sampler: &SamplerSettings) {
        if let Some(texture) = self.texture(texture) {
            *texture.sampler.lock() = *sampler;
        }
    }

    unsafe fn adopt_texture(
        &self,
        native: NativeTexture,
        desc: &TextureDesc,
        layer: Option<u32>,
    ) -> Result<(GpuTexture, TextureDesc), GpuError> {
        #[allow(irrefutable_let_patterns)]
        let NativeTexture::Null(native) = native else {
            return Err(GpuError::Misuse("native texture belongs to another backend".into()));
        };

        let mut adopted = *desc;
        adopted.format = match desc.format {
            TexFormat::None => format_from_native(native.format),
            format => format,
        };
        if adopted.format == TexFormat::None {
            return Err(GpuError::Unsupported(format!(
                "native format {} has no portable equivalent",
                native.format
            )));
        }
        adopted.width = native.width;
        adopted.height = native.height;
        let native_layers = native.array_count.max(1);
        (adopted.array_start, adopted.array_count) = adopted_layers(layer, native_layers)?;
        adopted.multisample = native.multisample.max(1);
        adopted.mip_count = native.mip_count.max(1);
        adopted.mips = if adopted.mip_count > 1 {
            MipPolicy::Generate
        } else {
            MipPolicy::None
        };
        Ok((GpuTexture::Null(NullTexture::new(&adopted, &[])?), adopted))
    }

    fn create_shader(
        &self,
        meta: &ShaderMeta,
        stages: &[(StageBits, &[u8])],
    ) -> Result<GpuShader, GpuError> {
        let mut present = StageBits::empty();
        for (stage, code) in stages {
            if code.is_empty() {
                return Err(GpuError::ShaderFormat(format!(
                    "{}: empty {stage:?} stage",
                    meta.name
                )));
            }
            present |= *stage;
        }
        log::trace!("NullBackend: creating shader '{}' ({present:?})", meta.name);
        Ok(GpuShader::Null(NullShader { stages: present }))
    }

    fn create_pipeline(
        &self,
        shader: &GpuShader,
        meta: &ShaderMeta,
        state: &PipelineState,
    ) -> Result<GpuPipeline, GpuError> {
        let shader = shader
            .as_null()
            .ok_or_else(|| GpuError::Misuse("shader belongs to another backend".into()))?;
        if !shader.stages.contains(StageBits::VERTEX | StageBits::PIXEL) {
            return Err(GpuError::Misuse(format!(
                "{}: pipeline needs vertex and pixel stages",
                meta.name
            )));
        }
        bump(&self.counters.raster_states, 1);
        bump(&self.counters.blend_states, 1);
        bump(&self.counters.depth_states, 1);
        Ok(GpuPipeline::Null(NullPipeline {
            state: Mutex::new(*state),
        }))
    }

    fn update_pipeline(&self, pipeline: &GpuPipeline, state: &PipelineState, group: StateGroup) {
        let Some(pipeline) = pipeline.as_null() else {
            return;
        };
        *pipeline.state.lock() = *state;
        let counter = match group {
            StateGroup::Raster => &self.counters.raster_states,
            StateGroup::Blend => &self.counters.blend_states,
            StateGroup::Depth => &self.counters.depth_states,
        };
        bump(counter, 1);
    }

    fn create_compute(&self, shader: &GpuShader, meta: &ShaderMeta) -> Result<GpuCompute, GpuError> {
        let shader = shader
            .as_null()
            .ok_or_else(|| GpuError::Misuse("shader belongs to another backend".into()))?;
        if !shader.stages.contains(StageBits::COMPUTE) {
            return Err(GpuError::Misuse(format!("{}: no compute stage", meta.name)));
        }
        Ok(GpuCompute::Null(NullCompute))
    }

    fn create_swapchain(
        &self,
        _window: Arc<dyn SwapchainWindow>,
        format: TexFormat,
        width: u32,
        height: u32,
    ) -> Result<GpuSwapchain, GpuError> {
        log::trace!("NullBackend: creating swapchain {width}x{height} ({format:?})");
        Ok(GpuSwapchain::Null(NullSwapchain {
            format,
            size: Mutex::new((width, height)),
        }))
    }

    fn resize_swapchain(&self, swapchain: &GpuSwapchain, width: u32, height: u32) -> Result<(), GpuError> {
        let swapchain = swapchain
            .as_null()
            .ok_or_else(|| GpuError::Misuse("swapchain belongs to another backend".into()))?;
        *swapchain.size.lock() = (width, height);
        Ok(())
    }

    fn swapchain_target(&self, swapchain: &GpuSwapchain) -> Result<GpuTexture, GpuError> {
        let swapchain = swapchain
            .as_null()
            .ok_or_else(|| GpuError::Misuse("swapchain belongs to another backend".into()))?;
        let (width, height) = *swapchain.size.lock();
        let mut desc = TextureDesc::new(
            TexType::RenderTarget,
            Usage::STATIC,
            swapchain.format,
            MipPolicy::None,
        );
        desc.width = width;
        desc.height = height;
        Ok(GpuTexture::Null(NullTexture::new(&desc, &[])?))
    }

    fn present(&self, _swapchain: &GpuSwapchain) {
        bump(&self.counters.presents, 1);
    }

    fn bind_target(&self, target: Option<TargetRef<'_>>) {
        bump(&self.counters.target_binds, 1);
        *self.target.lock() = target.and_then(|t| {
            t.color.as_null().map(|color| BoundTarget {
                layers: Arc::clone(&color.layers),
                desc: *t.desc,
                layer: t.layer,
                mip: t.mip,
            })
        });
    }

    fn set_viewport(&self, rect: Rect) {
        log::trace!("NullBackend: viewport {rect:?}");
    }

    fn set_scissor(&self, rect: Rect) {
        log::trace!("NullBackend: scissor {rect:?}");
    }

    fn clear(&self, color: Option<[f32; 4]>, depth: bool) {
        bump(&self.counters.clears, 1);
        log::trace!("NullBackend: clear color={color:?} depth={depth}");

        let target = self.target.lock();
        let (Some(target), Some(color)) = (target.as_ref(), color) else {
            return;
        };
        let Some(texel) = encode_color(target.desc.format, color) else {
            return;
        };
        let Some(range) = target.desc.mip_range(target.mip) else {
            return;
        };
        let mut layers = target.layers.lock();
        for (i, layer) in layers.iter_mut().enumerate() {
            if target.layer >= 0 && i as i32 != target.layer {
                continue;
            }
            if let Some(region) = layer.get_mut(range.clone()) {
                for chunk in region.chunks_exact_mut(texel.len()) {
                    chunk.copy_from_slice(&texel);
                }
            }
        }
    }

    fn apply_state(&self, changes: &[StateChange]) {
        bump(&self.counters.state_calls, changes.len() as u64);
    }

    fn bind_pipeline(&self, _pipeline: &GpuPipeline, changes: &[StateChange]) {
        bump(&self.counters.state_calls, changes.len() as u64);
    }

    fn bind_compute(&self, _compute: &GpuCompute) {
        bump(&self.counters.state_calls, 1);
    }

    fn bind_buffer(&self, _buffer: &GpuBuffer, slot: BufferSlot) {
        log::trace!("NullBackend: bind buffer {slot:?}");
        bump(&self.counters.buffer_binds, 1);
    }

    fn bind_texture(&self, _texture: &GpuTexture, bind: Bind) {
        log::trace!("NullBackend: bind texture {bind:?}");
        bump(&self.counters.texture_binds, 1);
    }

    fn draw(&self, index_start: u32, index_base: i32, index_count: u32, instances: u32) {
        log::trace!("NullBackend: draw {index_count} indices from {index_start} (base {index_base}) x{instances}");
        bump(&self.counters.draws, 1);
    }

    fn dispatch(&self, x: u32, y: u32, z: u32) {
        log::trace!("NullBackend: dispatch {x}x{y}x{z}");
        bump(&self.counters.dispatches, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BufferType;

    #[test]
    fn test_native_format_round_trip() {
        for format in TexFormat::ALL {
            let native = format_to_native(format);
            if native != 0 {
                assert_eq!(format_from_native(native), format);
            }
        }
        assert_eq!(format_to_native(TexFormat::Rgba32), 29);
        assert_eq!(format_from_native(0), TexFormat::None);
        assert_eq!(format_from_native(12345), TexFormat::None);
    }

    #[test]
    fn test_probe_rejects_pvrtc_and_atc() {
        let backend = NullBackend::new();
        assert!(backend.probe_format(TexFormat::Rgba32));
        assert!(backend.probe_format(TexFormat::Bc7Rgba));
        assert!(!backend.probe_format(TexFormat::Pvrtc1Rgb));
        assert!(!backend.probe_format(TexFormat::AtcRgba));
    }

    #[test]
    fn test_buffer_round_trip() {
        let backend = NullBackend::new();
        let desc = BufferDesc::new(BufferType::Vertex, Usage::STATIC, 4, 1);
        let buffer = backend.create_buffer(&desc, Some(&[1, 2, 3, 4])).unwrap();
        let mut out = [0u8; 4];
        backend.read_buffer(&buffer, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);

        let mut wrong = [0u8; 3];
        assert!(backend.read_buffer(&buffer, &mut wrong).is_err());
    }

    #[test]
    fn test_clear_fills_bound_target() {
        let backend = NullBackend::new();
        let mut desc = TextureDesc::new(
            TexType::RenderTarget,
            Usage::STATIC,
            TexFormat::Rgba32Linear,
            MipPolicy::None,
        );
        desc.width = 2;
        desc.height = 2;
        let texture = backend.create_texture(&desc, &[]).unwrap();
        backend.bind_target(Some(TargetRef {
            color: &texture,
            desc: &desc,
            layer: -1,
            mip: 0,
            depth: None,
        }));
        backend.clear(Some([1.0, 0.0, 0.0, 1.0]), false);

        let mut out = [0u8; 16];
        backend.read_texture(&texture, &desc, 0, 0, &mut out).unwrap();
        assert_eq!(&out[..4], &[255, 0, 0, 255]);
        assert_eq!(&out[12..], &[255, 0, 0, 255]);
        assert_eq!(backend.stats().unwrap().clears, 1);
    }

    #[test]
    fn test_state_calls_count_changes() {
        let backend = NullBackend::new();
        let shader = GpuShader::Null(NullShader {
            stages: StageBits::VERTEX | StageBits::PIXEL,
        });
        let meta = ShaderMeta::new("test");
        let pipeline = backend
            .create_pipeline(&shader, &meta, &PipelineState::default())
            .unwrap();
        backend.bind_pipeline(&pipeline, &[StateChange::Cull(crate::types::Cull::None)]);
        backend.bind_pipeline(&pipeline, &[]);
        let stats = backend.stats().unwrap();
        assert_eq!(stats.state_calls, 1);
        assert_eq!(stats.raster_states, 1);
    }

    #[test]
    fn test_adopt_uses_native_format() {
        let backend = NullBackend::new();
        let native = NullNativeTexture {
            width: 64,
            height: 32,
            array_count: 2,
            multisample: 1,
            mip_count: 7,
            format: 87,
        };
        let desc = TextureDesc::new(TexType::RenderTarget, Usage::STATIC, TexFormat::None, MipPolicy::None);
        let (_, adopted) =
            unsafe { backend.adopt_texture(NativeTexture::Null(native), &desc, None) }.unwrap();
        assert_eq!(adopted.format, TexFormat::Bgra32Linear);
        assert_eq!((adopted.width, adopted.height, adopted.array_count), (64, 32, 2));
        assert_eq!(adopted.array_start, 0);
        assert_eq!(adopted.mip_count, 7);
    }

    #[test]
    fn test_adopt_single_layer() {
        let backend = NullBackend::new();
        let native = NullNativeTexture {
            width: 16,
            height: 16,
            array_count: 2,
            multisample: 1,
            mip_count: 1,
            format: 28,
        };
        let desc = TextureDesc::new(TexType::RenderTarget, Usage::STATIC, TexFormat::None, MipPolicy::None);

        let (_, adopted) =
            unsafe { backend.adopt_texture(NativeTexture::Null(native), &desc, Some(1)) }.unwrap();
        assert_eq!((adopted.array_start, adopted.array_count), (1, 1));

        let err = unsafe { backend.adopt_texture(NativeTexture::Null(native), &desc, Some(2)) }.unwrap_err();
        assert!(matches!(err, GpuError::Misuse(_)));
    }
}

//! Resource handles and resource creation for the wgpu backend.

use std::collections::HashMap;
use std::sync::{Arc, mpsc};

use parking_lot::Mutex;

use crate::error::GpuError;
use crate::format::{TexFormat, mip_dimensions};
use crate::shader::ShaderMeta;
use crate::types::{
    BufferDesc, BufferType, PipelineState, StageBits, TexType, TextureDesc, Transparency,
};

use super::WgpuBackend;
use super::conversion::{
    convert_blend, convert_buffer_usage, convert_compare, convert_cull, convert_texture_format,
    convert_texture_usage, depth_aspect,
};
use super::reflect::Reflection;

/// Vertex layout every mesh shader reads: position, normal, uv and color.
const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x2,
    3 => Unorm8x4,
];

const VERTEX_STRIDE: u64 = crate::types::Vertex::SIZE as u64;

// ============================================================================
// Buffers
// ============================================================================

/// A wgpu buffer padded to the copy alignment.
pub struct WgpuBuffer {
    pub(super) buffer: Arc<wgpu::Buffer>,
    /// Size the caller asked for, before padding.
    pub(super) size: u64,
    pub(super) stride: u32,
}

impl WgpuBuffer {
    pub(super) fn index_format(&self) -> wgpu::IndexFormat {
        if self.stride == 2 {
            wgpu::IndexFormat::Uint16
        } else {
            wgpu::IndexFormat::Uint32
        }
    }
}

impl std::fmt::Debug for WgpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBuffer")
            .field("size", &self.size)
            .field("stride", &self.stride)
            .finish()
    }
}

/// Allocation size for a buffer. Constant buffers round up to 16 bytes.
pub(super) fn padded_size(desc: &BufferDesc) -> u64 {
    let align = match desc.ty {
        BufferType::Constant => 16,
        _ => wgpu::COPY_BUFFER_ALIGNMENT,
    };
    desc.size().max(align).next_multiple_of(align)
}

/// Copy `data` into a vector padded with zeroes to the copy alignment.
pub(super) fn pad_to_copy_alignment(data: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    let padded = (data.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT) as usize;
    if padded == data.len() {
        return std::borrow::Cow::Borrowed(data);
    }
    let mut bytes = data.to_vec();
    bytes.resize(padded, 0);
    std::borrow::Cow::Owned(bytes)
}

// ============================================================================
// Textures
// ============================================================================

/// A wgpu texture, or the current image of a swapchain.
pub struct WgpuTexture {
    pub(super) kind: TextureKind,
    pub(super) sampler: Mutex<Arc<wgpu::Sampler>>,
}

pub(super) enum TextureKind {
    Owned(OwnedTexture),
    Surface(Arc<SurfaceShared>),
}

/// A texture this backend created or adopted, with its views.
pub(super) struct OwnedTexture {
    pub texture: Arc<wgpu::Texture>,
    /// View over every layer and mip, for sampling.
    pub view: Arc<wgpu::TextureView>,
    /// One single-layer single-mip view per (layer, mip), layer-major.
    /// Empty unless the texture can be rendered to.
    pub target_views: Vec<Arc<wgpu::TextureView>>,
    pub format: wgpu::TextureFormat,
    pub samples: u32,
    pub mip_count: u32,
    /// First layer of `texture` covered by the views.
    pub array_start: u32,
}

impl OwnedTexture {
    pub(super) fn new(texture: wgpu::Texture, ty: TexType) -> Self {
        let layers = texture.depth_or_array_layers();
        Self::with_layers(texture, ty, 0, layers)
    }

    /// Views over `layers` layers of `texture` starting at `array_start`.
    pub(super) fn with_layers(texture: wgpu::Texture, ty: TexType, array_start: u32, layers: u32) -> Self {
        let format = texture.format();
        let mip_count = texture.mip_level_count();

        let dimension = match ty {
            TexType::Cubemap if layers == 6 => wgpu::TextureViewDimension::Cube,
            TexType::Cubemap if layers % 6 == 0 => wgpu::TextureViewDimension::CubeArray,
            _ if layers > 1 => wgpu::TextureViewDimension::D2Array,
            _ => wgpu::TextureViewDimension::D2,
        };
        // Combined depth-stencil can only be sampled through its depth aspect.
        let aspect = if format.has_depth_aspect() && format.has_stencil_aspect() {
            wgpu::TextureAspect::DepthOnly
        } else {
            wgpu::TextureAspect::All
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(dimension),
            aspect,
            base_array_layer: array_start,
            array_layer_count: Some(layers),
            ..Default::default()
        });

        let mut target_views = Vec::new();
        if texture.usage().contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
            for layer in 0..layers {
                for mip in 0..mip_count {
                    target_views.push(Arc::new(texture.create_view(&wgpu::TextureViewDescriptor {
                        dimension: Some(wgpu::TextureViewDimension::D2),
                        base_array_layer: array_start + layer,
                        array_layer_count: Some(1),
                        base_mip_level: mip,
                        mip_level_count: Some(1),
                        ..Default::default()
                    })));
                }
            }
        }

        Self {
            samples: texture.sample_count(),
            texture: Arc::new(texture),
            view: Arc::new(view),
            target_views,
            format,
            mip_count,
            array_start,
        }
    }

    /// Render view of one (layer, mip).
    pub(super) fn target_view(&self, layer: u32, mip: u32) -> Option<&Arc<wgpu::TextureView>> {
        self.target_views
            .get((layer * self.mip_count + mip) as usize)
    }
}

impl WgpuTexture {
    pub(super) fn owned(&self) -> Option<&OwnedTexture> {
        match &self.kind {
            TextureKind::Owned(owned) => Some(owned),
            TextureKind::Surface(_) => None,
        }
    }
}

impl std::fmt::Debug for WgpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TextureKind::Owned(owned) => f
                .debug_struct("WgpuTexture")
                .field("format", &owned.format)
                .field("size", &owned.texture.size())
                .field("mips", &owned.mip_count)
                .field("samples", &owned.samples)
                .finish(),
            TextureKind::Surface(surface) => f
                .debug_struct("WgpuTexture")
                .field("surface", &surface.view_format)
                .finish(),
        }
    }
}

// ============================================================================
// Shaders, pipelines and compute
// ============================================================================

/// Compiled stage modules with their reflected pipeline layout.
pub struct WgpuShader(pub(super) Arc<ShaderShared>);

pub(super) struct ShaderShared {
    pub name: String,
    pub vertex: Option<wgpu::ShaderModule>,
    pub pixel: Option<wgpu::ShaderModule>,
    pub compute: Option<wgpu::ShaderModule>,
    /// Whether the vertex stage reads vertex attributes at all.
    pub vertex_input: bool,
    /// Layout and entries per descriptor set.
    pub groups: Vec<(wgpu::BindGroupLayout, Vec<wgpu::BindGroupLayoutEntry>)>,
    pub layout: wgpu::PipelineLayout,
}

impl std::fmt::Debug for WgpuShader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuShader")
            .field("name", &self.0.name)
            .field("groups", &self.0.groups.len())
            .finish()
    }
}

/// Color format, depth format and sample count of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) struct TargetKey {
    pub color: wgpu::TextureFormat,
    pub depth: Option<wgpu::TextureFormat>,
    pub samples: u32,
}

/// A pipeline state whose render pipelines are built per target on demand.
pub struct WgpuPipeline(pub(super) Arc<PipelineShared>);

pub(super) struct PipelineShared {
    pub shader: Arc<ShaderShared>,
    pub state: Mutex<PipelineState>,
    pub variants: Mutex<HashMap<TargetKey, Arc<wgpu::RenderPipeline>>>,
}

impl std::fmt::Debug for WgpuPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuPipeline")
            .field("shader", &self.0.shader.name)
            .field("state", &*self.0.state.lock())
            .field("variants", &self.0.variants.lock().len())
            .finish()
    }
}

impl PipelineShared {
    /// Render pipeline for `key`, built and cached on first use.
    pub(super) fn variant(
        &self,
        backend: &WgpuBackend,
        key: TargetKey,
    ) -> Result<Arc<wgpu::RenderPipeline>, GpuError> {
        if let Some(pipeline) = self.variants.lock().get(&key) {
            return Ok(Arc::clone(pipeline));
        }

        let state = *self.state.lock();
        let shader = &self.shader;
        let (Some(vertex), Some(pixel)) = (&shader.vertex, &shader.pixel) else {
            return Err(GpuError::Misuse(format!(
                "{}: pipeline needs vertex and pixel stages",
                shader.name
            )));
        };

        let layouts = [wgpu::VertexBufferLayout {
            array_stride: VERTEX_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_ATTRIBUTES,
        }];
        let buffers: &[wgpu::VertexBufferLayout] = if shader.vertex_input { &layouts } else { &[] };

        let targets = [Some(wgpu::ColorTargetState {
            format: key.color,
            blend: convert_blend(state.transparency),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        log::debug!("WgpuBackend: building pipeline '{}' for {key:?}", shader.name);
        let pipeline = backend.scoped("render pipeline", || {
            backend.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: backend.label(&shader.name),
                layout: Some(&shader.layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: None,
                    compilation_options: Default::default(),
                    buffers,
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: convert_cull(state.cull),
                    polygon_mode: if state.wireframe {
                        wgpu::PolygonMode::Line
                    } else {
                        wgpu::PolygonMode::Fill
                    },
                    ..Default::default()
                },
                depth_stencil: key.depth.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: state.depth_write,
                    depth_compare: convert_compare(state.depth_test),
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: key.samples,
                    mask: !0,
                    alpha_to_coverage_enabled: state.transparency == Transparency::AlphaToCoverage
                        && key.samples > 1,
                },
                fragment: Some(wgpu::FragmentState {
                    module: pixel,
                    entry_point: None,
                    compilation_options: Default::default(),
                    targets: &targets,
                }),
                multiview: None,
                cache: None,
            })
        })?;

        let pipeline = Arc::new(pipeline);
        self.variants.lock().insert(key, Arc::clone(&pipeline));
        Ok(pipeline)
    }
}

/// A compute pipeline.
pub struct WgpuCompute(pub(super) Arc<ComputeShared>);

pub(super) struct ComputeShared {
    pub shader: Arc<ShaderShared>,
    pub pipeline: wgpu::ComputePipeline,
}

impl std::fmt::Debug for WgpuCompute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuCompute")
            .field("shader", &self.0.shader.name)
            .finish()
    }
}

// ============================================================================
// Swapchains
// ============================================================================

/// A configured window surface.
pub struct WgpuSwapchain(pub(super) Arc<SurfaceShared>);

pub(super) struct SurfaceShared {
    pub surface: wgpu::Surface<'static>,
    pub config: Mutex<wgpu::SurfaceConfiguration>,
    /// Format the target views use, which may be the sRGB twin of the
    /// surface format.
    pub view_format: wgpu::TextureFormat,
    current: Mutex<Option<(wgpu::SurfaceTexture, Arc<wgpu::TextureView>)>>,
}

impl std::fmt::Debug for WgpuSwapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.0.config.lock();
        f.debug_struct("WgpuSwapchain")
            .field("size", &(config.width, config.height))
            .field("format", &self.0.view_format)
            .finish()
    }
}

impl SurfaceShared {
    /// View of the image being drawn this frame, acquired on first use.
    pub(super) fn acquire(&self, device: &wgpu::Device) -> Option<Arc<wgpu::TextureView>> {
        let mut current = self.current.lock();
        if let Some((_, view)) = current.as_ref() {
            return Some(Arc::clone(view));
        }

        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                log::debug!("WgpuBackend: surface outdated, reconfiguring");
                self.surface.configure(device, &self.config.lock());
                match self.surface.get_current_texture() {
                    Ok(texture) => texture,
                    Err(e) => {
                        report_warn!("Failed to acquire swapchain image: {e}");
                        return None;
                    }
                }
            }
            Err(e) => {
                report_warn!("Failed to acquire swapchain image: {e}");
                return None;
            }
        };
        let view = Arc::new(texture.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(self.view_format),
            ..Default::default()
        }));
        *current = Some((texture, Arc::clone(&view)));
        Some(view)
    }

    /// Present the acquired image, if any.
    pub(super) fn present(&self) {
        match self.current.lock().take() {
            Some((texture, view)) => {
                drop(view);
                texture.present();
            }
            None => log::trace!("WgpuBackend: present without an acquired image"),
        }
    }

    pub(super) fn resize(&self, device: &wgpu::Device, width: u32, height: u32) {
        // The old image belongs to the old configuration.
        self.current.lock().take();
        let mut config = self.config.lock();
        config.width = width;
        config.height = height;
        self.surface.configure(device, &config);
    }
}

// ============================================================================
// Creation
// ============================================================================

impl WgpuBackend {
    pub(super) fn new_buffer(&self, desc: &BufferDesc, data: Option<&[u8]>) -> Result<WgpuBuffer, GpuError> {
        let size = padded_size(desc);
        let buffer = self.scoped("buffer", || {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: self.label("buffer"),
                size,
                usage: convert_buffer_usage(desc.ty, desc.usage),
                mapped_at_creation: data.is_some(),
            });
            if let Some(data) = data {
                let len = data.len().min(size as usize);
                buffer.slice(..).get_mapped_range_mut()[..len].copy_from_slice(&data[..len]);
                buffer.unmap();
            }
            buffer
        })?;
        Ok(WgpuBuffer {
            buffer: Arc::new(buffer),
            size: desc.size(),
            stride: desc.stride,
        })
    }

    /// Blocking copy of `size` bytes of `buffer` into host memory.
    pub(super) fn read_back(&self, size: u64, record: impl FnOnce(&mut wgpu::CommandEncoder, &wgpu::Buffer)) -> Result<Vec<u8>, GpuError> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: self.label("readback staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: self.label("readback"),
            });
        record(&mut encoder, &staging);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).ok();
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| GpuError::ResourceCreationFailed("readback was never mapped".into()))?
            .map_err(|e| GpuError::ResourceCreationFailed(format!("readback map failed: {e}")))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }

    pub(super) fn new_texture(
        &self,
        desc: &TextureDesc,
        data: &[&[u8]],
    ) -> Result<WgpuTexture, GpuError> {
        let format =
            convert_texture_format(desc.format).ok_or(GpuError::FormatUnsupported(desc.format))?;
        desc.checked_layer_size()?;
        let hardware_mips = desc.mip_count > 1 && self.hardware_mips(desc);
        let texture = self.scoped("texture", || {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: self.label("texture"),
                size: wgpu::Extent3d {
                    width: desc.width.max(1),
                    height: desc.height.max(1),
                    depth_or_array_layers: desc.array_count.max(1),
                },
                mip_level_count: desc.mip_count.max(1),
                sample_count: desc.multisample.max(1),
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: convert_texture_usage(desc, hardware_mips),
                view_formats: &[],
            })
        })?;

        let owned = OwnedTexture::new(texture, desc.ty);
        if !data.is_empty() {
            self.upload(&owned, desc, data);
        }
        Ok(WgpuTexture {
            kind: TextureKind::Owned(owned),
            sampler: Mutex::new(self.default_sampler()),
        })
    }

    /// Upload every mip present in `data`, one slice per layer.
    ///
    /// Layers may hold only mip 0 when the rest is generated on the GPU.
    pub(super) fn upload(&self, texture: &OwnedTexture, desc: &TextureDesc, data: &[&[u8]]) {
        if texture.samples > 1 {
            report_warn!("Multisampled textures can't be uploaded to");
            return;
        }
        let block = desc.format.block_px();
        for (layer, bytes) in data.iter().enumerate() {
            for mip in 0..desc.mip_count {
                let Some(mip_bytes) = desc.mip_range(mip).and_then(|range| bytes.get(range)) else {
                    break;
                };
                let (w, h) = mip_dimensions(desc.width, desc.height, mip);
                let Ok(pitch) = u32::try_from(desc.format.pitch(w)) else {
                    report_critical!("Row pitch of a {w} pixel wide {:?} mip exceeds u32", desc.format);
                    return;
                };
                let extent = wgpu::Extent3d {
                    width: w,
                    height: h,
                    depth_or_array_layers: 1,
                }
                .physical_size(texture.format);
                self.queue.write_texture(
                    wgpu::ImageCopyTexture {
                        texture: &texture.texture,
                        mip_level: mip,
                        origin: wgpu::Origin3d {
                            x: 0,
                            y: 0,
                            z: texture.array_start + layer as u32,
                        },
                        aspect: wgpu::TextureAspect::All,
                    },
                    mip_bytes,
                    wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(pitch),
                        rows_per_image: Some(h.div_ceil(block)),
                    },
                    extent,
                );
            }
        }
    }

    pub(super) fn read_mip(
        &self,
        texture: &OwnedTexture,
        desc: &TextureDesc,
        layer: u32,
        mip: u32,
        out: &mut [u8],
    ) -> Result<(), GpuError> {
        if texture.samples > 1 {
            return Err(GpuError::Unsupported("readback of a multisampled texture".into()));
        }
        if desc.format == TexFormat::DepthStencil {
            return Err(GpuError::Unsupported(
                "readback of a packed depth-stencil texture".into(),
            ));
        }

        let (w, h) = mip_dimensions(desc.width, desc.height, mip);
        let pitch = u32::try_from(desc.format.pitch(w))
            .map_err(|_| GpuError::Unsupported(format!("readback of a {w} pixel wide mip")))?;
        let rows = h.div_ceil(desc.format.block_px());
        let expected = u64::from(pitch) * u64::from(rows);
        if out.len() as u64 != expected {
            return Err(GpuError::Misuse(format!(
                "readback size {} does not match mip size {expected}",
                out.len()
            )));
        }
        let padded = pitch.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let extent = wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        }
        .physical_size(texture.format);

        let bytes = self.read_back(padded as u64 * rows as u64, |encoder, staging| {
            encoder.copy_texture_to_buffer(
                wgpu::ImageCopyTexture {
                    texture: &texture.texture,
                    mip_level: mip,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: texture.array_start + layer,
                    },
                    aspect: depth_aspect(desc.format),
                },
                wgpu::ImageCopyBuffer {
                    buffer: staging,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(padded),
                        rows_per_image: Some(rows),
                    },
                },
                extent,
            );
        })?;

        for (row, chunk) in out.chunks_exact_mut(pitch as usize).enumerate() {
            let start = row * padded as usize;
            chunk.copy_from_slice(&bytes[start..start + pitch as usize]);
        }
        Ok(())
    }

    pub(super) fn new_shader(
        &self,
        meta: &ShaderMeta,
        stages: &[(StageBits, &[u8])],
    ) -> Result<WgpuShader, GpuError> {
        let mut reflection = Reflection::default();
        let mut modules: [Option<wgpu::ShaderModule>; 3] = [None, None, None];
        for (stage, code) in stages {
            let (slot, visibility) = if *stage == StageBits::VERTEX {
                (0, wgpu::ShaderStages::VERTEX)
            } else if *stage == StageBits::PIXEL {
                (1, wgpu::ShaderStages::FRAGMENT)
            } else if *stage == StageBits::COMPUTE {
                (2, wgpu::ShaderStages::COMPUTE)
            } else {
                return Err(GpuError::ShaderFormat(format!(
                    "{}: unexpected stage {stage:?}",
                    meta.name
                )));
            };
            // Reflection also rejects blobs that are not SPIR-V.
            reflection.merge(Reflection::from_spirv(&meta.name, code, visibility)?);
            let module = self.scoped("shader module", || {
                self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: self.label(&meta.name),
                    source: wgpu::util::make_spirv(code),
                })
            })?;
            modules[slot] = Some(module);
        }

        let groups: Vec<_> = reflection
            .groups
            .into_iter()
            .map(|entries| {
                let layout = self
                    .device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: self.label(&meta.name),
                        entries: &entries,
                    });
                (layout, entries)
            })
            .collect();
        let layout = self.scoped("pipeline layout", || {
            let layouts: Vec<&wgpu::BindGroupLayout> = groups.iter().map(|(l, _)| l).collect();
            self.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: self.label(&meta.name),
                    bind_group_layouts: &layouts,
                    push_constant_ranges: &[],
                })
        })?;

        let [vertex, pixel, compute] = modules;
        log::debug!(
            "WgpuBackend: created shader '{}' ({} binding groups)",
            meta.name,
            groups.len()
        );
        Ok(WgpuShader(Arc::new(ShaderShared {
            name: meta.name.clone(),
            vertex,
            pixel,
            compute,
            vertex_input: !reflection.vertex_locations.is_empty(),
            groups,
            layout,
        })))
    }

    pub(super) fn new_compute(&self, shader: &WgpuShader) -> Result<WgpuCompute, GpuError> {
        let shared = &shader.0;
        let Some(module) = &shared.compute else {
            return Err(GpuError::Misuse(format!("{}: no compute stage", shared.name)));
        };
        let pipeline = self.scoped("compute pipeline", || {
            self.device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: self.label(&shared.name),
                    layout: Some(&shared.layout),
                    module,
                    entry_point: None,
                    compilation_options: Default::default(),
                    cache: None,
                })
        })?;
        Ok(WgpuCompute(Arc::new(ComputeShared {
            shader: Arc::clone(shared),
            pipeline,
        })))
    }

    pub(super) fn new_surface(
        &self,
        surface: wgpu::Surface<'static>,
        format: TexFormat,
        width: u32,
        height: u32,
    ) -> Result<WgpuSwapchain, GpuError> {
        let wanted = convert_texture_format(format).ok_or(GpuError::FormatUnsupported(format))?;
        let caps = surface.get_capabilities(&self.adapter);
        let base = wanted.remove_srgb_suffix();
        let (surface_format, view_formats) = if caps.formats.contains(&wanted) {
            (wanted, Vec::new())
        } else if caps.formats.contains(&base) {
            (base, vec![wanted])
        } else {
            return Err(GpuError::FormatUnsupported(format));
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats,
        };
        self.scoped("surface", || surface.configure(&self.device, &config))?;

        Ok(WgpuSwapchain(Arc::new(SurfaceShared {
            surface,
            config: Mutex::new(config),
            view_format: wanted,
            current: Mutex::new(None),
        })))
    }
}

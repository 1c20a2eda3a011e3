//! GPU device.
//!
//! The [`Device`] is the explicit context every resource is created from. It
//! owns the backend and all state that would otherwise be process-wide: the
//! bound render target, the applied-state cache, the deferred update queue,
//! the active backbuffer size and the shader metadata interning table.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;

use parking_lot::{Mutex, RwLock};

use crate::backend::{
    self, BackendStats, GpuBackend, GpuBuffer, GpuTexture, NativeFormat, NativeTexture, TargetRef,
};
use crate::config::DeviceParameters;
use crate::deferred::{Update, UpdateQueue};
use crate::error::GpuError;
use crate::file;
use crate::format::{FormatSupport, TexFormat, mip_dimensions};
use crate::resources::{Buffer, Compute, Mesh, Pipeline, Texture};
use crate::shader::file::{ShaderFile, content_hash};
use crate::shader::{Shader, ShaderMeta};
use crate::state::{SlotKey, StateCache, TargetBinding};
use crate::swapchain::{Swapchain, SwapchainWindow};
use crate::types::{
    Bind, BufferDesc, BufferSlot, BufferType, Capability, MipPolicy, Rect, ShaderLanguage,
    StageBits, TexType, TextureDesc, Usage,
};

/// Size and texture of the surface drawn to when no target is bound.
#[derive(Default)]
struct Backbuffer {
    size: (u32, u32),
    target: Option<Weak<Texture>>,
}

/// A GPU device for creating resources and issuing work.
///
/// # Thread Safety
///
/// `Device` is `Send + Sync`. Resources may be created from any thread, but
/// the device remembers the thread that created it: content updates to
/// existing dynamic resources made from other threads are queued and applied
/// at the next [`draw_begin`](Self::draw_begin).
///
/// # Example
///
/// ```ignore
/// let device = Device::new(DeviceParameters::new())?;
/// let vertices = device.create_buffer(
///     Some(bytemuck::cast_slice(&verts)),
///     verts.len() as u32,
///     Vertex::SIZE,
///     BufferType::Vertex,
///     Usage::STATIC,
/// )?;
/// ```
pub struct Device {
    backend: Arc<dyn GpuBackend>,
    params: DeviceParameters,
    formats: FormatSupport,
    owner: ThreadId,
    next_id: AtomicU64,
    state: Mutex<StateCache>,
    updates: UpdateQueue,
    backbuffer: Mutex<Backbuffer>,
    shader_metas: Mutex<HashMap<u64, Weak<ShaderMeta>>>,
    // Track allocated resources (weak references for cleanup/debugging)
    buffers: RwLock<Vec<Weak<Buffer>>>,
    textures: RwLock<Vec<Weak<Texture>>>,
    shaders: RwLock<Vec<Weak<Shader>>>,
    pipelines: RwLock<Vec<Weak<Pipeline>>>,
}

fn track<T>(list: &RwLock<Vec<Weak<T>>>, item: &Arc<T>) {
    let mut list = list.write();
    list.retain(|w| w.strong_count() > 0);
    list.push(Arc::downgrade(item));
}

fn live<T>(list: &RwLock<Vec<Weak<T>>>) -> usize {
    list.read().iter().filter(|w| w.strong_count() > 0).count()
}

impl Device {
    /// Create a device on the backend selected by `params`.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::DeviceInitFailed`] if no usable adapter is found.
    pub fn new(params: DeviceParameters) -> Result<Arc<Self>, GpuError> {
        let backend = backend::create_backend(&params).inspect_err(|e| {
            report_critical!("Failed to initialize a GPU device: {e}");
        })?;

        let formats = FormatSupport::probe(|format| backend.probe_format(format));
        report_info!(
            "Device: {} on '{}', {} texture formats supported",
            backend.name(),
            backend.adapter_name(),
            formats.len()
        );

        Ok(Arc::new(Self {
            backend,
            params,
            formats,
            owner: std::thread::current().id(),
            next_id: AtomicU64::new(1),
            state: Mutex::new(StateCache::new()),
            updates: UpdateQueue::default(),
            backbuffer: Mutex::new(Backbuffer::default()),
            shader_metas: Mutex::new(HashMap::new()),
            buffers: RwLock::new(Vec::new()),
            textures: RwLock::new(Vec::new()),
            shaders: RwLock::new(Vec::new()),
            pipelines: RwLock::new(Vec::new()),
        }))
    }

    /// Release the device.
    ///
    /// Resources still alive keep the device's backend alive until they drop;
    /// a warning is reported for them.
    pub fn shutdown(self: Arc<Self>) {
        let pending = self.updates.len();
        if pending > 0 {
            log::debug!("Device: discarding {pending} deferred uploads at shutdown");
        }
        let alive = Arc::strong_count(&self) - 1;
        if alive > 0 {
            report_warn!("Device shut down with {alive} resources still alive");
        }
        log::info!("Device: shutdown");
    }

    // ---- queries ----

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn adapter_name(&self) -> String {
        self.backend.adapter_name()
    }

    pub fn params(&self) -> &DeviceParameters {
        &self.params
    }

    /// Language of shader blobs this device loads.
    pub fn shader_language(&self) -> ShaderLanguage {
        self.backend.shader_language()
    }

    pub fn capability(&self, capability: Capability) -> bool {
        self.backend.capability(capability)
    }

    /// Whether `format` passed the creation probe.
    pub fn format_supported(&self, format: TexFormat) -> bool {
        self.formats.contains(format)
    }

    pub fn supported_formats(&self) -> FormatSupport {
        self.formats
    }

    pub fn format_to_native(&self, format: TexFormat) -> Option<NativeFormat> {
        self.backend.format_to_native(format)
    }

    pub fn format_from_native(&self, native: NativeFormat) -> TexFormat {
        self.backend.format_from_native(native)
    }

    /// Backend call counters, when the backend keeps them.
    pub fn backend_stats(&self) -> Option<BackendStats> {
        self.backend.stats()
    }

    /// Number of uploads waiting for the next [`draw_begin`](Self::draw_begin).
    pub fn pending_updates(&self) -> usize {
        self.updates.len()
    }

    /// Get the number of live buffers created by this device.
    pub fn buffer_count(&self) -> usize {
        live(&self.buffers)
    }

    /// Get the number of live textures created by this device.
    pub fn texture_count(&self) -> usize {
        live(&self.textures)
    }

    /// Get the number of live shaders created by this device.
    pub fn shader_count(&self) -> usize {
        live(&self.shaders)
    }

    /// Get the number of live pipelines created by this device.
    pub fn pipeline_count(&self) -> usize {
        live(&self.pipelines)
    }

    // ---- resource creation ----

    /// Create a buffer of `count` elements of `stride` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is smaller than the buffer or the backend
    /// fails to allocate it.
    pub fn create_buffer(
        self: &Arc<Self>,
        data: Option<&[u8]>,
        count: u32,
        stride: u32,
        ty: BufferType,
        usage: Usage,
    ) -> Result<Arc<Buffer>, GpuError> {
        let desc = BufferDesc::new(ty, usage, count, stride);
        if let Some(data) = data
            && (data.len() as u64) < desc.size()
        {
            let err = GpuError::ResourceCreationFailed(format!(
                "buffer data is {} bytes, expected {}",
                data.len(),
                desc.size()
            ));
            report_critical!("{err}");
            return Err(err);
        }

        let gpu = self.backend.create_buffer(&desc, data).inspect_err(|e| {
            report_critical!("Failed to create a {ty:?} buffer: {e}");
        })?;
        let buffer = Arc::new(Buffer::new(Arc::clone(self), self.next_id(), desc, gpu));
        track(&self.buffers, &buffer);

        log::trace!(
            "Device: created {ty:?} buffer {} ({} x {} bytes)",
            buffer.id(),
            count,
            stride
        );
        Ok(buffer)
    }

    /// Create a texture descriptor. Backing storage is allocated by the
    /// first [`Texture::set_contents_arr`].
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::FormatUnsupported`] if the format failed probing.
    pub fn create_texture(
        self: &Arc<Self>,
        ty: TexType,
        usage: Usage,
        format: TexFormat,
        mips: MipPolicy,
    ) -> Result<Arc<Texture>, GpuError> {
        if !self.format_supported(format) {
            report_critical!("Texture format {format:?} is not supported by this device");
            return Err(GpuError::FormatUnsupported(format));
        }
        if usage.is_dynamic() && mips == MipPolicy::Generate {
            report_warn!("Dynamic textures don't support mip-maps!");
        }

        let desc = TextureDesc::new(ty, usage, format, mips);
        let texture = Arc::new(Texture::new(Arc::clone(self), self.next_id(), desc, None));
        track(&self.textures, &texture);

        log::trace!("Device: created {ty:?} texture {} ({format:?})", texture.id());
        Ok(texture)
    }

    /// Adopt a texture created outside this layer.
    ///
    /// `format` overrides the native format unless it is [`TexFormat::None`].
    ///
    /// # Safety
    ///
    /// `native` must be a live texture created on this device's adapter, and
    /// its creator must keep it alive for as long as the returned texture.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn create_texture_from_existing(
        self: &Arc<Self>,
        native: NativeTexture,
        ty: TexType,
        format: TexFormat,
        width: u32,
        height: u32,
        array_count: u32,
        multisample: u32,
    ) -> Result<Arc<Texture>, GpuError> {
        let mut desc = TextureDesc::new(ty, Usage::STATIC, format, MipPolicy::None);
        desc.width = width;
        desc.height = height;
        desc.array_count = array_count.max(1);
        desc.multisample = multisample.max(1);

        // SAFETY: forwarded from this function's contract.
        unsafe { self.adopt(native, desc, None) }
    }

    /// Adopt one array layer of a texture created outside this layer, such
    /// as a single eye of a stereo swapchain image.
    ///
    /// The result has one layer; binding it as a target or reading it back
    /// addresses `array_layer` of `native`.
    ///
    /// # Safety
    ///
    /// Same contract as [`create_texture_from_existing`](Self::create_texture_from_existing).
    pub unsafe fn create_texture_from_layer(
        self: &Arc<Self>,
        native: NativeTexture,
        ty: TexType,
        format: TexFormat,
        width: u32,
        height: u32,
        array_layer: u32,
    ) -> Result<Arc<Texture>, GpuError> {
        let mut desc = TextureDesc::new(ty, Usage::STATIC, format, MipPolicy::None);
        desc.width = width;
        desc.height = height;
        desc.array_start = array_layer;

        // SAFETY: forwarded from this function's contract.
        unsafe { self.adopt(native, desc, Some(array_layer)) }
    }

    /// # Safety
    ///
    /// See [`GpuBackend::adopt_texture`].
    unsafe fn adopt(
        self: &Arc<Self>,
        native: NativeTexture,
        desc: TextureDesc,
        layer: Option<u32>,
    ) -> Result<Arc<Texture>, GpuError> {
        // SAFETY: forwarded from the caller's contract.
        let (gpu, desc) = unsafe { self.backend.adopt_texture(native, &desc, layer) }.inspect_err(|e| {
            report_critical!("Failed to adopt a native texture: {e}");
        })?;

        let texture = self.register_texture(desc, gpu);
        log::trace!(
            "Device: adopted {:?} texture {} ({}x{}, layers {}..{}, {:?})",
            desc.ty,
            texture.id(),
            desc.width,
            desc.height,
            desc.array_start,
            desc.array_start + desc.array_count,
            desc.format
        );
        Ok(texture)
    }

    /// Pair a vertex and an index buffer.
    pub fn create_mesh(&self, vertices: Option<&Arc<Buffer>>, indices: Option<&Arc<Buffer>>) -> Mesh {
        Mesh::new(vertices, indices)
    }

    /// Create a shader from compiled stage blobs in this device's language.
    ///
    /// # Errors
    ///
    /// Returns an error if no stage is given or the backend rejects a blob.
    pub fn create_shader(
        self: &Arc<Self>,
        meta: Arc<ShaderMeta>,
        vertex: Option<&[u8]>,
        pixel: Option<&[u8]>,
        compute: Option<&[u8]>,
    ) -> Result<Arc<Shader>, GpuError> {
        let stages: Vec<(StageBits, &[u8])> = [
            (StageBits::VERTEX, vertex),
            (StageBits::PIXEL, pixel),
            (StageBits::COMPUTE, compute),
        ]
        .into_iter()
        .filter_map(|(stage, code)| code.map(|code| (stage, code)))
        .collect();

        if stages.is_empty() {
            let err = GpuError::ShaderFormat(format!("'{}' has no stages", meta.name));
            report_critical!("{err}");
            return Err(err);
        }

        let gpu = self.backend.create_shader(&meta, &stages).inspect_err(|e| {
            report_critical!("Failed to create shader '{}': {e}", meta.name);
        })?;
        let present = stages.iter().fold(StageBits::empty(), |acc, (s, _)| acc | *s);
        let shader = Arc::new(Shader::new(Arc::clone(self), self.next_id(), meta, gpu, present));
        if !shader.is_valid() {
            report_warn!(
                "Shader '{}' has neither a vertex+pixel pair nor a compute stage",
                shader.name()
            );
        }
        track(&self.shaders, &shader);

        log::trace!("Device: created shader {} '{}' ({present:?})", shader.id(), shader.name());
        Ok(shader)
    }

    /// Create a shader from an in-memory `.sks` file.
    ///
    /// Only the blobs in this device's language are decoded. Shaders loaded
    /// from identical bytes share one [`ShaderMeta`].
    pub fn create_shader_from_memory(self: &Arc<Self>, bytes: &[u8]) -> Result<Arc<Shader>, GpuError> {
        let language = self.shader_language();
        let ShaderFile { meta, stages } = ShaderFile::load_for(bytes, language).inspect_err(|e| {
            report_critical!("Failed to load shader: {e}");
        })?;

        let code = |bits: StageBits| {
            stages
                .iter()
                .find(|s| s.stage == bits)
                .map(|s| s.code.as_slice())
        };
        let (vertex, pixel, compute) = (
            code(StageBits::VERTEX),
            code(StageBits::PIXEL),
            code(StageBits::COMPUTE),
        );
        if vertex.is_none() && pixel.is_none() && compute.is_none() {
            let err = GpuError::ShaderFormat(format!("'{}' has no {language:?} stages", meta.name));
            report_critical!("{err}");
            return Err(err);
        }

        let meta = self.intern_meta(content_hash(bytes), meta);
        self.create_shader(meta, vertex, pixel, compute)
    }

    /// Create a shader from a `.sks` file read through the file hook.
    pub fn create_shader_from_file(self: &Arc<Self>, path: impl AsRef<Path>) -> Result<Arc<Shader>, GpuError> {
        let path = path.as_ref();
        let Some(bytes) = file::read_file(path) else {
            report_critical!("Shader file not found: {}", path.display());
            return Err(GpuError::FileNotFound(path.display().to_string()));
        };
        self.create_shader_from_memory(&bytes)
    }

    /// Create a pipeline with default state for a vertex+pixel shader.
    pub fn create_pipeline(self: &Arc<Self>, shader: &Arc<Shader>) -> Result<Arc<Pipeline>, GpuError> {
        if !shader.stages().contains(StageBits::VERTEX | StageBits::PIXEL) {
            let err = GpuError::Misuse(format!(
                "pipeline shader '{}' needs vertex and pixel stages",
                shader.name()
            ));
            report_critical!("{err}");
            return Err(err);
        }

        let pipeline = Arc::new(Pipeline::new(Arc::clone(self), self.next_id(), Arc::clone(shader))?);
        track(&self.pipelines, &pipeline);

        log::trace!("Device: created pipeline {} for '{}'", pipeline.id(), shader.name());
        Ok(pipeline)
    }

    /// Create a compute kernel from a shader with a compute stage.
    pub fn create_compute(self: &Arc<Self>, shader: &Arc<Shader>) -> Result<Arc<Compute>, GpuError> {
        if !shader.stages().contains(StageBits::COMPUTE) {
            let err = GpuError::Misuse(format!("shader '{}' has no compute stage", shader.name()));
            report_critical!("{err}");
            return Err(err);
        }
        let compute = Arc::new(Compute::new(Arc::clone(self), self.next_id(), Arc::clone(shader))?);
        log::trace!("Device: created compute {} for '{}'", compute.id(), shader.name());
        Ok(compute)
    }

    /// Create a presentable swapchain for `window`.
    ///
    /// Linear 8-bit color formats present through their sRGB counterpart. A
    /// `depth_format` of [`TexFormat::None`] creates no depth buffer.
    pub fn create_swapchain(
        self: &Arc<Self>,
        window: Arc<dyn SwapchainWindow>,
        color_format: TexFormat,
        depth_format: TexFormat,
        width: u32,
        height: u32,
    ) -> Result<Swapchain, GpuError> {
        Swapchain::new(Arc::clone(self), window, color_format, depth_format, width, height)
            .inspect_err(|e| report_critical!("Failed to create a swapchain: {e}"))
    }

    // ---- frame ----

    /// Start a frame, applying uploads queued from other threads.
    pub fn draw_begin(&self) {
        if !self.on_owner_thread() {
            report_warn!("draw_begin called off the thread that created the device");
        }
        self.updates.flush(self.backend.as_ref());
        self.backend.begin_frame();
    }

    /// Redirect rendering to `target`, or back to the backbuffer with `None`.
    ///
    /// `layer` selects one array layer, or -1 for all layers at once. The
    /// viewport is reset to the size of the bound mip.
    pub fn target_bind(&self, target: Option<&Texture>, layer: i32, mip: u32) {
        match target {
            Some(texture) => {
                let Some(desc) = self.bind_target_texture(texture, layer, mip) else {
                    return;
                };
                let (w, h) = mip_dimensions(desc.width, desc.height, mip);
                self.apply_target_state(
                    Some(TargetBinding {
                        texture: texture.id(),
                        layer,
                        mip,
                    }),
                    Rect::from_size(w, h),
                );
            }
            None => self.bind_backbuffer(),
        }
    }

    /// Currently bound target, or `None` for the backbuffer.
    pub fn target_get(&self) -> Option<TargetBinding> {
        self.state.lock().target()
    }

    /// Clear the bound target. Depth clears force depth writes on.
    pub fn target_clear(&self, depth: bool, color: Option<[f32; 4]>) {
        if depth && let Some(change) = self.state.lock().force_depth_write() {
            self.backend.apply_state(&[change]);
        }
        self.backend.clear(color, depth);
    }

    pub fn viewport(&self, rect: Rect) {
        self.state.lock().set_viewport(rect);
        self.backend.set_viewport(rect);
    }

    pub fn viewport_get(&self) -> Rect {
        self.state.lock().viewport()
    }

    /// Scissor rectangle, used by pipelines with scissor enabled.
    pub fn scissor(&self, rect: Rect) {
        self.backend.set_scissor(rect);
    }

    /// Draw `index_count` indices from `index_start`, offsetting vertex
    /// indices by `index_base`, `instances` times.
    pub fn draw(&self, index_start: u32, index_base: i32, index_count: u32, instances: u32) {
        if index_start.checked_add(index_count).is_none() {
            report_warn!("Skipping draw of {index_count} indices from {index_start}: range overflows");
            return;
        }
        self.backend.draw(index_start, index_base, index_count, instances);
    }

    pub fn dispatch(&self, x: u32, y: u32, z: u32) {
        self.backend.dispatch(x, y, z);
    }

    // ---- crate-internal ----

    pub(crate) fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn on_owner_thread(&self) -> bool {
        std::thread::current().id() == self.owner
    }

    /// Wrap backing storage created outside `create_texture`.
    pub(crate) fn register_texture(self: &Arc<Self>, desc: TextureDesc, gpu: GpuTexture) -> Arc<Texture> {
        let texture = Arc::new(Texture::new(Arc::clone(self), self.next_id(), desc, Some(gpu)));
        texture.apply_default_sampler();
        track(&self.textures, &texture);
        texture
    }

    pub(crate) fn queue_update(&self, update: Update) {
        self.updates.push(update);
    }

    /// Drop every cached binding of a destroyed resource.
    pub(crate) fn forget(&self, id: u64) {
        let target_cleared = self.state.lock().forget(id);
        if target_cleared {
            self.bind_backbuffer();
        }
    }

    pub(crate) fn bind_pipeline(&self, pipeline: &Pipeline) {
        let state = pipeline.state();
        let (changes, switched) =
            self.state
                .lock()
                .bind_pipeline(pipeline.id(), pipeline.shader().id(), &state);
        if switched || !changes.is_empty() {
            self.backend.bind_pipeline(pipeline.gpu(), &changes);
        }
    }

    pub(crate) fn bind_compute(&self, compute: &Compute) {
        if self.state.lock().bind_compute(compute.id()) {
            self.backend.bind_compute(compute.gpu());
        }
    }

    pub(crate) fn bind_buffer(&self, id: u64, gpu: &GpuBuffer, key: SlotKey, slot: BufferSlot) {
        if self.state.lock().bind_slot(key, id) {
            self.backend.bind_buffer(gpu, slot);
        }
    }

    pub(crate) fn bind_texture(&self, id: u64, gpu: &GpuTexture, bind: Bind) {
        let key = SlotKey {
            register: bind.register_type,
            slot: bind.slot,
        };
        if self.state.lock().bind_slot(key, id) {
            self.backend.bind_texture(gpu, bind);
        }
    }

    /// Make `target` the surface used when no texture target is bound.
    pub(crate) fn set_backbuffer(&self, target: &Arc<Texture>, width: u32, height: u32) {
        let mut backbuffer = self.backbuffer.lock();
        backbuffer.size = (width, height);
        backbuffer.target = Some(Arc::downgrade(target));
    }

    /// Swap the backbuffer texture after a resize, if `old` was active.
    ///
    /// When no texture target is bound, rendering moves to the new surface
    /// right away and the viewport follows its size.
    pub(crate) fn replace_backbuffer(&self, old: u64, target: &Arc<Texture>, width: u32, height: u32) {
        let was_active = {
            let backbuffer = self.backbuffer.lock();
            backbuffer
                .target
                .as_ref()
                .and_then(Weak::upgrade)
                .is_none_or(|t| t.id() == old)
        };
        if !was_active {
            return;
        }
        self.set_backbuffer(target, width, height);
        if self.target_get().is_none() {
            self.bind_backbuffer();
        }
    }

    /// A texture's backing storage was replaced: cached slot bindings point
    /// at the old storage, and a bound target must be re-sent.
    pub(crate) fn texture_reallocated(&self, texture: &Texture) {
        let current = {
            let mut state = self.state.lock();
            state.forget_slots(texture.id());
            state.target()
        };
        if let Some(binding) = current
            && binding.texture == texture.id()
        {
            self.target_bind(Some(texture), binding.layer, binding.mip);
        }
    }

    /// Re-send the current target when something attached to it changed.
    pub(crate) fn rebind_if_target(&self, texture: &Texture) {
        let current = self.state.lock().target();
        if let Some(binding) = current
            && binding.texture == texture.id()
        {
            self.bind_target_texture(texture, binding.layer, binding.mip);
        }
    }

    fn bind_backbuffer(&self) {
        let (size, target) = {
            let backbuffer = self.backbuffer.lock();
            (backbuffer.size, backbuffer.target.as_ref().and_then(Weak::upgrade))
        };
        match &target {
            Some(texture) => {
                self.bind_target_texture(texture, -1, 0);
            }
            None => self.backend.bind_target(None),
        }
        self.apply_target_state(None, Rect::from_size(size.0, size.1));
    }

    fn apply_target_state(&self, binding: Option<TargetBinding>, viewport: Rect) {
        {
            let mut state = self.state.lock();
            state.set_target(binding);
            state.set_viewport(viewport);
        }
        self.backend.set_viewport(viewport);
    }

    /// Hand `texture` and its depth attachment to the backend.
    fn bind_target_texture(&self, texture: &Texture, layer: i32, mip: u32) -> Option<TextureDesc> {
        let state = texture.state.read();
        let desc = state.desc;
        if !desc.is_render_target() {
            report_warn!("Only render target textures can be bound as a target");
            return None;
        }
        let Some(color) = state.gpu.as_deref() else {
            report_warn!("Can't bind a render target that has no contents yet");
            return None;
        };
        if mip >= desc.mip_count || layer < -1 || layer >= desc.array_count as i32 {
            report_warn!(
                "Render target layer {layer} mip {mip} is out of range ({} layers, {} mips)",
                desc.array_count,
                desc.mip_count
            );
            return None;
        }

        let depth_state = state.depth.as_ref().map(|d| d.state.read());
        let depth = depth_state
            .as_ref()
            .and_then(|d| d.gpu.as_deref().map(|gpu| (gpu, &d.desc)));
        self.backend.bind_target(Some(TargetRef {
            color,
            desc: &desc,
            layer,
            mip,
            depth,
        }));
        Some(desc)
    }

    fn intern_meta(&self, key: u64, meta: ShaderMeta) -> Arc<ShaderMeta> {
        let mut metas = self.shader_metas.lock();
        metas.retain(|_, weak| weak.strong_count() > 0);
        if let Some(existing) = metas.get(&key).and_then(Weak::upgrade)
            && *existing == meta
        {
            return existing;
        }
        let meta = Arc::new(meta);
        metas.insert(key, Arc::downgrade(&meta));
        meta
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("backend", &self.backend.name())
            .field("adapter", &self.backend.adapter_name())
            .field("formats", &self.formats.len())
            .finish_non_exhaustive()
    }
}

// Ensure Device is Send + Sync
static_assertions::assert_impl_all!(Device: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendType;

    fn null_device() -> Arc<Device> {
        Device::new(DeviceParameters::new().with_backend(BackendType::Null)).unwrap()
    }

    #[test]
    fn test_null_device_probes_formats() {
        let device = null_device();
        assert_eq!(device.backend_name(), "Null Backend");
        assert!(device.format_supported(TexFormat::Rgba32));
        assert!(!device.format_supported(TexFormat::Pvrtc1Rgb));
        assert!(!device.format_supported(TexFormat::None));
    }

    #[test]
    fn test_ids_are_unique() {
        let device = null_device();
        let a = device.next_id();
        let b = device.next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_resource_tracking() {
        let device = null_device();
        let buffer = device
            .create_buffer(Some(&[0; 16]), 4, 4, BufferType::Constant, Usage::STATIC)
            .unwrap();
        assert_eq!(device.buffer_count(), 1);
        drop(buffer);
        assert_eq!(device.buffer_count(), 0);
    }

    #[test]
    fn test_short_buffer_data_is_rejected() {
        let device = null_device();
        let result = device.create_buffer(Some(&[0; 3]), 1, 4, BufferType::Vertex, Usage::STATIC);
        assert!(matches!(result, Err(GpuError::ResourceCreationFailed(_))));
    }

    #[test]
    fn test_unsupported_texture_format() {
        let device = null_device();
        let result = device.create_texture(
            TexType::Image,
            Usage::STATIC,
            TexFormat::AtcRgb,
            MipPolicy::None,
        );
        assert!(matches!(result, Err(GpuError::FormatUnsupported(TexFormat::AtcRgb))));
    }

    #[test]
    fn test_viewport_round_trip() {
        let device = null_device();
        device.viewport(Rect::new(1, 2, 30, 40));
        assert_eq!(device.viewport_get(), Rect::new(1, 2, 30, 40));
    }
}

//! GPU texture resource.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::GpuTexture;
use crate::deferred::Update;
use crate::device::Device;
use crate::error::GpuError;
use crate::format::{TexFormat, mip_count, mip_dimensions};
use crate::types::{
    Bind, MipPolicy, RegisterType, SamplerSettings, TexAddress, TexSample, TexType, TextureDesc,
    Usage,
};

use super::downsample::build_mip_chain;

pub(crate) struct TextureState {
    pub desc: TextureDesc,
    pub gpu: Option<Arc<GpuTexture>>,
    /// `None` until a sampler is set or contents first arrive.
    pub sampler: Option<SamplerSettings>,
    pub depth: Option<Arc<Texture>>,
}

/// A GPU texture resource.
///
/// Textures are created by [`Device::create_texture`] and are reference-counted.
/// Backing storage is allocated by the first call to
/// [`set_contents_arr`](Self::set_contents_arr); until then the texture only
/// carries its type, usage, format and mip policy.
///
/// # Example
///
/// ```ignore
/// let texture = device.create_texture(TexType::Image, Usage::STATIC, TexFormat::Rgba32, MipPolicy::Generate)?;
/// texture.set_contents(&pixels, 128, 64);
/// assert_eq!(texture.mip_count(), 8);
/// ```
pub struct Texture {
    device: Arc<Device>,
    id: u64,
    pub(crate) state: RwLock<TextureState>,
}

fn fail<T>(err: GpuError) -> Result<T, GpuError> {
    report_critical!("{err}");
    Err(err)
}

impl Texture {
    /// Create a new texture (called by Device).
    pub(crate) fn new(device: Arc<Device>, id: u64, desc: TextureDesc, gpu: Option<GpuTexture>) -> Self {
        Self {
            device,
            id,
            state: RwLock::new(TextureState {
                desc,
                gpu: gpu.map(Arc::new),
                sampler: None,
                depth: None,
            }),
        }
    }

    /// Unique id, never reused within a device.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Snapshot of the texture's current description.
    pub fn desc(&self) -> TextureDesc {
        self.state.read().desc
    }

    pub fn ty(&self) -> TexType {
        self.state.read().desc.ty
    }

    pub fn usage(&self) -> Usage {
        self.state.read().desc.usage
    }

    pub fn format(&self) -> TexFormat {
        self.state.read().desc.format
    }

    pub fn width(&self) -> u32 {
        self.state.read().desc.width
    }

    pub fn height(&self) -> u32 {
        self.state.read().desc.height
    }

    pub fn array_count(&self) -> u32 {
        self.state.read().desc.array_count
    }

    /// Get the mip level count.
    pub fn mip_count(&self) -> u32 {
        self.state.read().desc.mip_count
    }

    /// Get the sample count.
    pub fn multisample(&self) -> u32 {
        self.state.read().desc.multisample
    }

    /// Whether backing storage has been allocated.
    pub fn has_contents(&self) -> bool {
        self.state.read().gpu.is_some()
    }

    pub fn sampler(&self) -> SamplerSettings {
        self.state.read().sampler.unwrap_or_default()
    }

    /// Depth texture attached to this render target.
    pub fn depth(&self) -> Option<Arc<Texture>> {
        self.state.read().depth.clone()
    }

    pub(crate) fn gpu(&self) -> Option<Arc<GpuTexture>> {
        self.state.read().gpu.clone()
    }

    /// Set a single-layer texture from one mip of tightly packed texels.
    pub fn set_contents(&self, data: &[u8], width: u32, height: u32) {
        self.set_contents_arr(&[data], 1, 1, width, height, 1);
    }

    /// Allocate or update the texture's storage.
    ///
    /// `layers` holds one slice per array layer, each with `mip_count` mips
    /// laid out contiguously, or is empty to allocate without contents.
    /// Mips are generated from the top level when the texture's policy asks
    /// for it and a single mip is supplied.
    pub fn set_contents_arr(
        &self,
        layers: &[&[u8]],
        array_count: u32,
        mip_count_in: u32,
        width: u32,
        height: u32,
        multisample: u32,
    ) {
        let mut state = self.state.write();
        let desc = state.desc;
        let dynamic = desc.usage.is_dynamic();

        if state.gpu.is_some() && !dynamic {
            report_warn!("Only dynamic textures can be updated!");
            return;
        }
        if dynamic && (desc.mips == MipPolicy::Generate || array_count > 1) {
            report_warn!("Dynamic textures don't support mip-maps or texture arrays!");
            return;
        }
        if desc.ty == TexType::Cubemap && array_count != 6 {
            report_warn!("Cubemaps need 6 layers, got {array_count}!");
            return;
        }
        if !layers.is_empty() && layers.len() != array_count as usize {
            report_critical!(
                "Texture data has {} layers, but array_count is {array_count}",
                layers.len()
            );
            return;
        }
        if !self.device.format_supported(desc.format) {
            report_critical!("Texture format {:?} is not supported by this device", desc.format);
            return;
        }

        let generate = (width > 1 || height > 1)
            && desc.mips == MipPolicy::Generate
            && !layers.is_empty()
            && desc.format.can_make_mips()
            && mip_count_in <= 1;

        let mut next = desc;
        next.width = width;
        next.height = height;
        next.array_count = array_count.max(1);
        next.multisample = multisample.max(1);
        next.mip_count = if generate {
            mip_count(width, height)
        } else {
            mip_count_in.max(1)
        };

        // Layout of what each supplied layer has to carry.
        let supplied_desc = TextureDesc {
            mip_count: if generate { 1 } else { next.mip_count },
            ..next
        };
        let supplied = match next
            .checked_layer_size()
            .and_then(|_| supplied_desc.checked_layer_size())
        {
            Ok(size) => size,
            Err(e) => {
                report_critical!("{e}");
                return;
            }
        };
        if let Some((i, layer)) = layers.iter().enumerate().find(|(_, l)| l.len() != supplied) {
            report_critical!(
                "Texture data for layer {i} is {} bytes, expected exactly {supplied} ({:?} {width}x{height})",
                layer.len(),
                desc.format
            );
            return;
        }

        let hardware = generate && self.device.backend().supports_hardware_mips(&next);
        let owned: Vec<Vec<u8>> = if generate && !hardware {
            let chains: Option<Vec<Vec<u8>>> = layers
                .iter()
                .map(|layer| build_mip_chain(next.format, layer, width, height, next.mip_count))
                .collect();
            match chains {
                Some(chains) => chains,
                None => {
                    report_warn!("No software mip generator for {:?}, using a single mip", next.format);
                    next.mip_count = 1;
                    layers.iter().map(|l| l.to_vec()).collect()
                }
            }
        } else {
            layers.iter().map(|l| l.to_vec()).collect()
        };
        let slices: Vec<&[u8]> = owned.iter().map(Vec::as_slice).collect();

        let backend = self.device.backend();
        let reuse = state.gpu.as_ref().filter(|_| {
            desc.width == next.width
                && desc.height == next.height
                && desc.array_count == next.array_count
                && desc.multisample == next.multisample
                && desc.mip_count == next.mip_count
        });

        if let Some(gpu) = reuse {
            if self.device.on_owner_thread() {
                backend.write_texture(gpu, &next, &slices);
            } else {
                log::trace!("Texture {}: queueing upload from another thread", self.id);
                self.device.queue_update(Update::Texture {
                    texture: Arc::clone(gpu),
                    desc: next,
                    layers: owned,
                });
            }
            state.desc = next;
            return;
        }

        let gpu = match backend.create_texture(&next, &slices) {
            Ok(gpu) => gpu,
            Err(e) => {
                report_critical!("Failed to create texture storage: {e}");
                return;
            }
        };
        if hardware {
            backend.generate_mips(&gpu, &next);
        }

        let sampler = *state.sampler.get_or_insert_default();
        backend.set_sampler(&gpu, &sampler);
        let replaced = state.gpu.replace(Arc::new(gpu)).is_some();
        state.desc = next;
        drop(state);
        if replaced {
            self.device.texture_reallocated(self);
        }

        log::trace!(
            "Texture {}: allocated {}x{}x{} {:?} with {} mips",
            self.id,
            width,
            height,
            next.array_count,
            next.format,
            next.mip_count
        );
    }

    /// Attach a depth texture to this render target.
    ///
    /// Both textures must have the same number of array layers.
    pub fn attach_depth(&self, depth: &Arc<Texture>) {
        if std::ptr::eq(self, depth.as_ref()) {
            report_warn!("Can't attach a texture as its own depth buffer");
            return;
        }
        let target = self.desc();
        if !target.is_render_target() {
            report_warn!("Can't bind a depth texture to a non-rendertarget");
            return;
        }
        let depth_desc = depth.desc();
        if depth_desc.ty != TexType::Depth {
            report_warn!("Can't attach a {:?} texture as a depth buffer", depth_desc.ty);
            return;
        }
        if depth_desc.array_count != target.array_count {
            report_warn!(
                "Mismatching array count for depth texture ({} vs {})",
                depth_desc.array_count,
                target.array_count
            );
            return;
        }

        self.state.write().depth = Some(Arc::clone(depth));
        self.device.rebind_if_target(self);
    }

    /// Read back mip 0 of layer 0.
    pub fn get_contents(&self, out: &mut [u8]) -> Result<(), GpuError> {
        self.get_mip_contents_arr(0, 0, out)
    }

    /// Read back one mip of layer 0.
    pub fn get_mip_contents(&self, mip: u32, out: &mut [u8]) -> Result<(), GpuError> {
        self.get_mip_contents_arr(mip, 0, out)
    }

    /// Blocking readback of one (mip, layer) into `out`.
    ///
    /// `out` must be exactly the size of that mip.
    pub fn get_mip_contents_arr(&self, mip: u32, layer: u32, out: &mut [u8]) -> Result<(), GpuError> {
        let state = self.state.read();
        let desc = state.desc;
        let Some(gpu) = state.gpu.as_deref() else {
            return fail(GpuError::Misuse("texture has no contents to read".to_string()));
        };
        if mip > 0 && desc.mip_count <= 1 {
            return fail(GpuError::Misuse(
                "Can't get mip data from a texture with no mips!".to_string(),
            ));
        }
        if mip >= desc.mip_count {
            return fail(GpuError::Misuse(format!(
                "This texture doesn't have quite as many mip levels as you think. ({mip} >= {})",
                desc.mip_count
            )));
        }
        if layer >= desc.array_count {
            return fail(GpuError::Misuse(format!(
                "layer {layer} out of range, texture has {}",
                desc.array_count
            )));
        }
        if desc.multisample > 1 {
            return fail(GpuError::Unsupported(
                "readback of a multisampled texture".to_string(),
            ));
        }
        let Some(expected) = desc.mip_size(mip) else {
            return fail(GpuError::Unsupported(format!(
                "mip {mip} of a {}x{} {:?} texture is too large to read back",
                desc.width, desc.height, desc.format
            )));
        };
        if out.len() != expected {
            return fail(GpuError::Misuse(format!(
                "readback buffer is {} bytes, mip {mip} is {expected}",
                out.len()
            )));
        }

        self.device
            .backend()
            .read_texture(gpu, &desc, layer, mip, out)
            .inspect_err(|e| report_critical!("Texture readback failed: {e}"))
    }

    /// Set sampler addressing, filtering and anisotropy.
    pub fn settings(&self, address: TexAddress, sample: TexSample, anisotropy: u32) {
        let sampler = SamplerSettings {
            address,
            sample,
            anisotropy,
        };
        let mut state = self.state.write();
        state.sampler = Some(sampler);
        if let Some(gpu) = &state.gpu {
            self.device.backend().set_sampler(gpu, &sampler);
        }
    }

    /// Apply the default sampler if none was set yet.
    pub(crate) fn apply_default_sampler(&self) {
        let mut state = self.state.write();
        let sampler = *state.sampler.get_or_insert_default();
        if let Some(gpu) = &state.gpu {
            self.device.backend().set_sampler(gpu, &sampler);
        }
    }

    /// Bind as a shader resource, or as a storage texture for
    /// [`RegisterType::ReadWrite`] on compute-writable textures.
    pub fn bind(&self, bind: Bind) {
        let (gpu, usage) = {
            let state = self.state.read();
            (state.gpu.clone(), state.desc.usage)
        };
        let Some(gpu) = gpu else {
            report_warn!("Can't bind texture {} before it has contents", self.id);
            return;
        };

        let register_type = match bind.register_type {
            RegisterType::Default | RegisterType::Resource => RegisterType::Resource,
            RegisterType::ReadWrite if usage.contains(Usage::COMPUTE_WRITE) => RegisterType::ReadWrite,
            RegisterType::ReadWrite => {
                report_critical!("Read-write texture binds need compute write usage");
                return;
            }
            other => {
                report_critical!("Can't bind a texture to a {other:?} slot");
                return;
            }
        };
        self.device.bind_texture(self.id, &gpu, Bind { register_type, ..bind });
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        log::trace!("Texture {}: destroyed", self.id);
        self.device.forget(self.id);
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let desc = self.desc();
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("ty", &desc.ty)
            .field("format", &desc.format)
            .field("width", &desc.width)
            .field("height", &desc.height)
            .field("array_count", &desc.array_count)
            .field("mip_count", &desc.mip_count)
            .finish()
    }
}

// Ensure Texture is Send + Sync
static_assertions::assert_impl_all!(Texture: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendType, DeviceParameters};

    fn null_device() -> Arc<Device> {
        Device::new(DeviceParameters::new().with_backend(BackendType::Null)).unwrap()
    }

    fn rgba(device: &Arc<Device>, ty: TexType, usage: Usage, mips: MipPolicy) -> Arc<Texture> {
        device.create_texture(ty, usage, TexFormat::Rgba32, mips).unwrap()
    }

    #[test]
    fn test_storage_is_deferred() {
        let device = null_device();
        let texture = rgba(&device, TexType::Image, Usage::STATIC, MipPolicy::None);
        assert!(!texture.has_contents());

        texture.set_contents(&[0; 16], 2, 2);
        assert!(texture.has_contents());
        assert_eq!(texture.width(), 2);
        assert_eq!(texture.mip_count(), 1);
    }

    #[test]
    fn test_static_texture_updates_once() {
        let device = null_device();
        let texture = rgba(&device, TexType::Image, Usage::STATIC, MipPolicy::None);
        texture.set_contents(&[1; 4], 1, 1);
        texture.set_contents(&[2; 16], 2, 2);

        assert_eq!(texture.width(), 1);
        let mut out = [0u8; 4];
        texture.get_contents(&mut out).unwrap();
        assert_eq!(out, [1; 4]);
    }

    #[test]
    fn test_dynamic_rejects_arrays() {
        let device = null_device();
        let texture = rgba(&device, TexType::Image, Usage::DYNAMIC, MipPolicy::None);
        texture.set_contents_arr(&[&[0; 4], &[0; 4]], 2, 1, 1, 1, 1);
        assert!(!texture.has_contents());
    }

    #[test]
    fn test_mismatched_data_is_rejected() {
        let device = null_device();
        let texture = rgba(&device, TexType::Image, Usage::STATIC, MipPolicy::None);
        texture.set_contents(&[0; 12], 2, 2);
        assert!(!texture.has_contents());
        texture.set_contents(&[0; 20], 2, 2);
        assert!(!texture.has_contents());
    }

    #[test]
    fn test_cubemap_needs_six_layers() {
        let device = null_device();
        let texture = rgba(&device, TexType::Cubemap, Usage::STATIC, MipPolicy::None);
        texture.set_contents_arr(&[&[0; 4]], 1, 1, 1, 1, 1);
        assert!(!texture.has_contents());

        let face: &[u8] = &[0; 4];
        texture.set_contents_arr(&[face; 6], 6, 1, 1, 1, 1);
        assert_eq!(texture.array_count(), 6);
    }

    #[test]
    fn test_generated_mips_are_readable() {
        let device = null_device();
        let texture = rgba(&device, TexType::Image, Usage::STATIC, MipPolicy::Generate);
        let pixels = [255u8; 4 * 4 * 4];
        texture.set_contents(&pixels, 4, 4);
        assert_eq!(texture.mip_count(), 3);

        let mut last = [0u8; 4];
        texture.get_mip_contents(2, &mut last).unwrap();
        assert_eq!(last, [255; 4]);
    }

    #[test]
    fn test_mip_readback_errors() {
        let device = null_device();
        let texture = rgba(&device, TexType::Image, Usage::STATIC, MipPolicy::None);
        texture.set_contents(&[0; 16], 2, 2);

        let mut out = [0u8; 4];
        assert!(matches!(texture.get_mip_contents(1, &mut out), Err(GpuError::Misuse(_))));
        assert!(matches!(texture.get_contents(&mut out), Err(GpuError::Misuse(_))));
        assert!(matches!(
            texture.get_mip_contents_arr(0, 1, &mut [0; 16]),
            Err(GpuError::Misuse(_))
        ));
    }

    #[test]
    fn test_settings_reach_backend() {
        let device = null_device();
        let texture = rgba(&device, TexType::Image, Usage::STATIC, MipPolicy::None);
        texture.set_contents(&[0; 4], 1, 1);
        texture.settings(TexAddress::Clamp, TexSample::Point, 0);

        let gpu = texture.gpu().unwrap();
        let sampler = gpu.as_null().unwrap().sampler();
        assert_eq!(sampler.address, TexAddress::Clamp);
        assert_eq!(sampler.sample, TexSample::Point);
    }

    #[test]
    fn test_attach_depth_requires_render_target() {
        let device = null_device();
        let image = rgba(&device, TexType::Image, Usage::STATIC, MipPolicy::None);
        let depth = device
            .create_texture(TexType::Depth, Usage::STATIC, TexFormat::Depth32, MipPolicy::None)
            .unwrap();
        image.attach_depth(&depth);
        assert!(image.depth().is_none());
    }
}

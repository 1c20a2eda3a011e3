//! Swapchain management.
//!
//! A [`Swapchain`] owns a presentable surface for one window plus the render
//! target texture that draws into it and an optional depth buffer attached to
//! that target.
//!
//! # Example
//!
//! ```ignore
//! let swapchain = device.create_swapchain(window, TexFormat::Rgba32Linear, TexFormat::Depth32, 800, 600)?;
//!
//! // In render loop:
//! device.draw_begin();
//! swapchain.bind();
//! device.target_clear(true, Some([0.0, 0.0, 0.0, 1.0]));
//! // ... draw ...
//! swapchain.present();
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::backend::GpuSwapchain;
use crate::device::Device;
use crate::error::GpuError;
use crate::format::TexFormat;
use crate::resources::Texture;
use crate::types::{MipPolicy, TexType, TextureDesc, Usage};

/// A window a swapchain can present to.
pub trait SwapchainWindow: HasWindowHandle + HasDisplayHandle + Send + Sync {}

impl<T: HasWindowHandle + HasDisplayHandle + Send + Sync + ?Sized> SwapchainWindow for T {}

/// A presentable surface with its render target and depth buffer.
pub struct Swapchain {
    device: Arc<Device>,
    gpu: GpuSwapchain,
    color_format: TexFormat,
    depth_format: TexFormat,
    size: Mutex<(u32, u32)>,
    target: RwLock<Arc<Texture>>,
    depth: RwLock<Option<Arc<Texture>>>,
}

type Targets = (Arc<Texture>, Option<Arc<Texture>>);

impl Swapchain {
    pub(crate) fn new(
        device: Arc<Device>,
        window: Arc<dyn SwapchainWindow>,
        color_format: TexFormat,
        depth_format: TexFormat,
        width: u32,
        height: u32,
    ) -> Result<Self, GpuError> {
        let color_format = color_format.srgb_target();
        if !device.format_supported(color_format) {
            return Err(GpuError::FormatUnsupported(color_format));
        }
        if depth_format != TexFormat::None && !depth_format.is_depth() {
            return Err(GpuError::Misuse(format!(
                "{depth_format:?} is not a depth format"
            )));
        }

        let gpu = device
            .backend()
            .create_swapchain(window, color_format, width, height)?;
        let (target, depth) =
            Self::create_targets(&device, &gpu, color_format, depth_format, width, height)?;
        device.set_backbuffer(&target, width, height);

        log::info!("Swapchain: created {width}x{height} ({color_format:?}, depth {depth_format:?})");
        Ok(Self {
            device,
            gpu,
            color_format,
            depth_format,
            size: Mutex::new((width, height)),
            target: RwLock::new(target),
            depth: RwLock::new(depth),
        })
    }

    fn create_targets(
        device: &Arc<Device>,
        gpu: &GpuSwapchain,
        color_format: TexFormat,
        depth_format: TexFormat,
        width: u32,
        height: u32,
    ) -> Result<Targets, GpuError> {
        let mut desc = TextureDesc::new(TexType::RenderTarget, Usage::STATIC, color_format, MipPolicy::None);
        desc.width = width;
        desc.height = height;
        let target = device.register_texture(desc, device.backend().swapchain_target(gpu)?);

        if depth_format == TexFormat::None {
            return Ok((target, None));
        }
        let depth = device.create_texture(TexType::Depth, Usage::STATIC, depth_format, MipPolicy::None)?;
        depth.set_contents_arr(&[], 1, 1, width, height, 1);
        if !depth.has_contents() {
            return Err(GpuError::ResourceCreationFailed(format!(
                "swapchain depth buffer {width}x{height} ({depth_format:?})"
            )));
        }
        target.attach_depth(&depth);
        Ok((target, Some(depth)))
    }

    /// Resize the surface, recreating the target and depth buffer.
    ///
    /// Resizing to the current size does nothing, and zero sizes are ignored.
    pub fn resize(&self, width: u32, height: u32) -> Result<(), GpuError> {
        let mut size = self.size.lock();
        if *size == (width, height) {
            return Ok(());
        }
        if width == 0 || height == 0 {
            log::debug!("Swapchain: ignoring resize to {width}x{height}");
            return Ok(());
        }

        self.device
            .backend()
            .resize_swapchain(&self.gpu, width, height)
            .inspect_err(|e| report_critical!("Failed to resize swapchain: {e}"))?;
        let (target, depth) = Self::create_targets(
            &self.device,
            &self.gpu,
            self.color_format,
            self.depth_format,
            width,
            height,
        )
        .inspect_err(|e| report_critical!("Failed to recreate swapchain targets: {e}"))?;

        let old = self.target.read().id();
        self.device.replace_backbuffer(old, &target, width, height);
        *size = (width, height);
        *self.target.write() = target;
        *self.depth.write() = depth;

        log::debug!("Swapchain: resized to {width}x{height}");
        Ok(())
    }

    /// Submit the frame drawn into the target.
    pub fn present(&self) {
        self.device.backend().present(&self.gpu);
    }

    /// Make this swapchain the backbuffer and bind it as the render target.
    pub fn bind(&self) {
        let (width, height) = *self.size.lock();
        let target = Arc::clone(&self.target.read());
        self.device.set_backbuffer(&target, width, height);
        self.device.target_bind(None, -1, 0);
    }

    pub fn width(&self) -> u32 {
        self.size.lock().0
    }

    pub fn height(&self) -> u32 {
        self.size.lock().1
    }

    /// Color format after sRGB promotion.
    pub fn color_format(&self) -> TexFormat {
        self.color_format
    }

    pub fn depth_format(&self) -> TexFormat {
        self.depth_format
    }

    pub fn target(&self) -> Arc<Texture> {
        Arc::clone(&self.target.read())
    }

    pub fn depth(&self) -> Option<Arc<Texture>> {
        self.depth.read().clone()
    }
}

impl std::fmt::Debug for Swapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swapchain")
            .field("size", &*self.size.lock())
            .field("color_format", &self.color_format)
            .field("depth_format", &self.depth_format)
            .finish()
    }
}

static_assertions::assert_impl_all!(Swapchain: Send, Sync);

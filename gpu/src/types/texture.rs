//! Texture types and descriptors.

use std::ops::Range;

use crate::error::GpuError;
use crate::format::{TexFormat, mip_count, mip_dimensions};

use super::buffer::Usage;

/// What a texture is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TexType {
    #[default]
    Image,
    /// Six-layer cube texture.
    Cubemap,
    RenderTarget,
    Depth,
}

/// Whether mips are generated from the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipPolicy {
    Generate,
    #[default]
    None,
}

/// Texture coordinate addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TexAddress {
    #[default]
    Repeat,
    Clamp,
    Mirror,
}

/// Texture filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TexSample {
    #[default]
    Linear,
    Point,
    Anisotropic,
}

/// Sampler state attached to a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerSettings {
    pub address: TexAddress,
    pub sample: TexSample,
    /// Maximum anisotropy, 0 for the backend default.
    pub anisotropy: u32,
}

/// Full description of a texture's backing storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub ty: TexType,
    pub usage: Usage,
    pub format: TexFormat,
    pub mips: MipPolicy,
    pub width: u32,
    pub height: u32,
    pub array_count: u32,
    /// First layer of the backing storage this texture covers. Non-zero only
    /// for textures wrapping one layer of an external array.
    pub array_start: u32,
    pub multisample: u32,
    /// Number of mip levels actually allocated.
    pub mip_count: u32,
}

impl TextureDesc {
    pub fn new(ty: TexType, usage: Usage, format: TexFormat, mips: MipPolicy) -> Self {
        Self {
            ty,
            usage,
            format,
            mips,
            width: 0,
            height: 0,
            array_count: 1,
            array_start: 0,
            multisample: 1,
            mip_count: 1,
        }
    }

    /// Full mip chain length for the current size.
    pub fn full_mip_count(&self) -> u32 {
        mip_count(self.width, self.height)
    }

    /// Index of the per-(layer, mip) view for render targets.
    pub fn view_index(&self, layer: u32, mip: u32) -> usize {
        (layer * self.mip_count + mip) as usize
    }

    pub fn is_render_target(&self) -> bool {
        self.ty == TexType::RenderTarget
    }

    /// Size of one mip level in bytes.
    ///
    /// The size helpers return `None` when the result does not fit in
    /// addressable memory.
    pub fn mip_size(&self, mip: u32) -> Option<usize> {
        let (w, h) = mip_dimensions(self.width, self.height, mip);
        usize::try_from(self.format.memory(w, h)?).ok()
    }

    /// Byte offset of `mip` within one layer's contiguous mip chain.
    pub fn mip_offset(&self, mip: u32) -> Option<usize> {
        (0..mip).try_fold(0usize, |offset, m| offset.checked_add(self.mip_size(m)?))
    }

    /// Byte range of `mip` within one layer.
    pub fn mip_range(&self, mip: u32) -> Option<Range<usize>> {
        let start = self.mip_offset(mip)?;
        Some(start..start.checked_add(self.mip_size(mip)?)?)
    }

    /// Bytes in one layer with all of its allocated mips.
    pub fn layer_size(&self) -> Option<usize> {
        self.mip_offset(self.mip_count)
    }

    /// Bytes in one layer, or an error naming the texture when it is too
    /// large to address.
    pub fn checked_layer_size(&self) -> Result<usize, GpuError> {
        self.layer_size()
            .filter(|size| size.checked_mul(self.array_count as usize).is_some())
            .ok_or_else(|| {
                GpuError::ResourceCreationFailed(format!(
                    "{}x{}x{} {:?} texture with {} mips is too large to address",
                    self.width, self.height, self.array_count, self.format, self.mip_count
                ))
            })
    }
}

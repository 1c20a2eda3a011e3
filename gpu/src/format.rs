//! Format catalog.
//!
//! Portable texture and vertex formats, the block/pitch/memory math shared by
//! every backend, mip-chain math, and the format-support bitset filled in by
//! probing at device creation.

// ============================================================================
// Texture Formats
// ============================================================================

/// Portable texture format.
///
/// Variants are ordered so that every block-compressed format comes at or
/// after [`TexFormat::COMPRESSED_START`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u32)]
pub enum TexFormat {
    #[default]
    None = 0,
    /// 8-bit RGBA, sRGB encoded.
    Rgba32,
    /// 8-bit RGBA, linear.
    Rgba32Linear,
    /// 8-bit BGRA, sRGB encoded.
    Bgra32,
    /// 8-bit BGRA, linear.
    Bgra32Linear,
    Rg11b10,
    Rgb10a2,
    /// 16-bit unsigned normalized RGBA.
    Rgba64u,
    /// 16-bit signed normalized RGBA.
    Rgba64s,
    /// 16-bit float RGBA.
    Rgba64f,
    /// 32-bit float RGBA.
    Rgba128,
    R8,
    R16u,
    R16s,
    R16f,
    R32,
    DepthStencil,
    Depth32,
    Depth16,
    R8g8,
    Bc1RgbSrgb,
    Bc1Rgb,
    Bc3RgbaSrgb,
    Bc3Rgba,
    Bc4R,
    Bc5Rg,
    Bc7RgbaSrgb,
    Bc7Rgba,
    Etc1Rgb,
    Etc2RgbaSrgb,
    Etc2Rgba,
    Etc2R11,
    Etc2Rg11,
    Pvrtc1RgbSrgb,
    Pvrtc1Rgb,
    Pvrtc1RgbaSrgb,
    Pvrtc1Rgba,
    Pvrtc2RgbaSrgb,
    Pvrtc2Rgba,
    Astc4x4RgbaSrgb,
    Astc4x4Rgba,
    AtcRgb,
    AtcRgba,
}

impl TexFormat {
    /// First block-compressed format.
    pub const COMPRESSED_START: TexFormat = TexFormat::Bc1RgbSrgb;

    /// Every format except [`TexFormat::None`], in ordinal order.
    pub const ALL: [TexFormat; 42] = [
        Self::Rgba32,
        Self::Rgba32Linear,
        Self::Bgra32,
        Self::Bgra32Linear,
        Self::Rg11b10,
        Self::Rgb10a2,
        Self::Rgba64u,
        Self::Rgba64s,
        Self::Rgba64f,
        Self::Rgba128,
        Self::R8,
        Self::R16u,
        Self::R16s,
        Self::R16f,
        Self::R32,
        Self::DepthStencil,
        Self::Depth32,
        Self::Depth16,
        Self::R8g8,
        Self::Bc1RgbSrgb,
        Self::Bc1Rgb,
        Self::Bc3RgbaSrgb,
        Self::Bc3Rgba,
        Self::Bc4R,
        Self::Bc5Rg,
        Self::Bc7RgbaSrgb,
        Self::Bc7Rgba,
        Self::Etc1Rgb,
        Self::Etc2RgbaSrgb,
        Self::Etc2Rgba,
        Self::Etc2R11,
        Self::Etc2Rg11,
        Self::Pvrtc1RgbSrgb,
        Self::Pvrtc1Rgb,
        Self::Pvrtc1RgbaSrgb,
        Self::Pvrtc1Rgba,
        Self::Pvrtc2RgbaSrgb,
        Self::Pvrtc2Rgba,
        Self::Astc4x4RgbaSrgb,
        Self::Astc4x4Rgba,
        Self::AtcRgb,
        Self::AtcRgba,
    ];

    /// Look a format up by its ordinal.
    pub fn from_ordinal(value: u32) -> Option<Self> {
        if value == 0 {
            return Some(Self::None);
        }
        Self::ALL.get(value as usize - 1).copied()
    }

    /// Whether this is a block-compressed format.
    pub fn is_compressed(self) -> bool {
        self >= Self::COMPRESSED_START
    }

    /// Whether this is a depth (or depth-stencil) format.
    pub fn is_depth(self) -> bool {
        matches!(self, Self::DepthStencil | Self::Depth32 | Self::Depth16)
    }

    /// Whether the format stores sRGB-encoded color.
    pub fn is_srgb(self) -> bool {
        matches!(
            self,
            Self::Rgba32
                | Self::Bgra32
                | Self::Bc1RgbSrgb
                | Self::Bc3RgbaSrgb
                | Self::Bc7RgbaSrgb
                | Self::Etc2RgbaSrgb
                | Self::Pvrtc1RgbSrgb
                | Self::Pvrtc1RgbaSrgb
                | Self::Pvrtc2RgbaSrgb
                | Self::Astc4x4RgbaSrgb
        )
    }

    /// Width and height of one compression block, in pixels.
    pub fn block_px(self) -> u32 {
        if self.is_compressed() { 4 } else { 1 }
    }

    /// Size of one pixel (or one compressed block) in bytes.
    pub fn block_size(self) -> u32 {
        match self {
            Self::None => 0,

            Self::Etc1Rgb
            | Self::Bc1RgbSrgb
            | Self::Bc1Rgb
            | Self::Bc4R
            | Self::Pvrtc1RgbSrgb
            | Self::Pvrtc1Rgb
            | Self::Pvrtc1RgbaSrgb
            | Self::Pvrtc1Rgba
            | Self::AtcRgb
            | Self::Pvrtc2RgbaSrgb
            | Self::Pvrtc2Rgba
            | Self::Etc2R11 => 8,

            Self::Bc7RgbaSrgb
            | Self::Bc7Rgba
            | Self::Etc2RgbaSrgb
            | Self::Etc2Rgba
            | Self::Bc3RgbaSrgb
            | Self::Bc3Rgba
            | Self::Bc5Rg
            | Self::Astc4x4RgbaSrgb
            | Self::Astc4x4Rgba
            | Self::AtcRgba
            | Self::Etc2Rg11 => 16,

            Self::Rgba32
            | Self::Rgba32Linear
            | Self::Bgra32
            | Self::Bgra32Linear
            | Self::R32
            | Self::Depth32
            | Self::DepthStencil
            | Self::Rg11b10
            | Self::Rgb10a2 => 4,

            Self::R16u | Self::R16s | Self::R16f | Self::R8g8 | Self::Depth16 => 2,
            Self::R8 => 1,
            Self::Rgba64u | Self::Rgba64s | Self::Rgba64f => 8,
            Self::Rgba128 => 16,
        }
    }

    /// Bytes occupied by a `width` x `height` image in this format, or `None`
    /// if that does not fit in a `u64`.
    pub fn memory(self, width: u32, height: u32) -> Option<u64> {
        let rows = u64::from(height.div_ceil(self.block_px()));
        self.pitch(width).checked_mul(rows)
    }

    /// Bytes in one row of blocks for an image `width` pixels wide.
    pub fn pitch(self, width: u32) -> u64 {
        u64::from(width.div_ceil(self.block_px())) * u64::from(self.block_size())
    }

    /// Whether the software mip generator has a kernel for this format.
    pub fn can_make_mips(self) -> bool {
        matches!(
            self,
            Self::Bgra32
                | Self::Bgra32Linear
                | Self::Rgba32
                | Self::Rgba32Linear
                | Self::Rgba64u
                | Self::Rgba64s
                | Self::Rgba128
                | Self::Depth32
                | Self::R32
                | Self::Depth16
                | Self::R16u
                | Self::R16s
                | Self::R8g8
                | Self::R8
        )
    }

    /// Format used for a presentable target requested in this format.
    ///
    /// Linear 8-bit color is presented through its sRGB counterpart.
    pub fn srgb_target(self) -> Self {
        match self {
            Self::Rgba32Linear => Self::Rgba32,
            Self::Bgra32Linear => Self::Bgra32,
            other => other,
        }
    }
}

// ============================================================================
// Mip Math
// ============================================================================

/// Number of levels in a full mip chain for a `width` x `height` image.
pub fn mip_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    largest.ilog2() + 1
}

/// Dimensions of mip `level` of a `width` x `height` image.
pub fn mip_dimensions(width: u32, height: u32, level: u32) -> (u32, u32) {
    let w = width.checked_shr(level).unwrap_or(0).max(1);
    let h = height.checked_shr(level).unwrap_or(0).max(1);
    (w, h)
}

// ============================================================================
// Vertex Formats
// ============================================================================

/// Scalar format of one vertex component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum VertexFormat {
    #[default]
    None = 0,
    F64,
    F32,
    F16,
    I32,
    I16,
    I8,
    I32n,
    I16n,
    I8n,
    Ui32,
    Ui16,
    Ui8,
    Ui32n,
    Ui16n,
    Ui8n,
}

impl VertexFormat {
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::None,
            1 => Self::F64,
            2 => Self::F32,
            3 => Self::F16,
            4 => Self::I32,
            5 => Self::I16,
            6 => Self::I8,
            7 => Self::I32n,
            8 => Self::I16n,
            9 => Self::I8n,
            10 => Self::Ui32,
            11 => Self::Ui16,
            12 => Self::Ui8,
            13 => Self::Ui32n,
            14 => Self::Ui16n,
            15 => Self::Ui8n,
            _ => return None,
        })
    }

    /// Size of one scalar in bytes.
    pub fn size(self) -> u32 {
        match self {
            Self::None => 0,
            Self::F64 => 8,
            Self::F32 | Self::I32 | Self::I32n | Self::Ui32 | Self::Ui32n => 4,
            Self::F16 | Self::I16 | Self::I16n | Self::Ui16 | Self::Ui16n => 2,
            Self::I8 | Self::I8n | Self::Ui8 | Self::Ui8n => 1,
        }
    }
}

/// Meaning of a vertex component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum Semantic {
    #[default]
    None = 0,
    Position,
    Texcoord,
    Normal,
    Binormal,
    Tangent,
    Color,
    Psize,
    BlendWeight,
    BlendIndices,
}

impl Semantic {
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::None,
            1 => Self::Position,
            2 => Self::Texcoord,
            3 => Self::Normal,
            4 => Self::Binormal,
            5 => Self::Tangent,
            6 => Self::Color,
            7 => Self::Psize,
            8 => Self::BlendWeight,
            9 => Self::BlendIndices,
            _ => return None,
        })
    }
}

// ============================================================================
// Format Support
// ============================================================================

/// Set of texture formats the active backend accepted during probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatSupport(u64);

impl FormatSupport {
    /// Probe every format with `probe` and record the results.
    pub fn probe(mut probe: impl FnMut(TexFormat) -> bool) -> Self {
        let mut support = Self::default();
        for format in TexFormat::ALL {
            if probe(format) {
                support.insert(format);
            }
        }
        support
    }

    pub fn insert(&mut self, format: TexFormat) {
        self.0 |= 1 << format as u32;
    }

    pub fn contains(&self, format: TexFormat) -> bool {
        format != TexFormat::None && self.0 & (1 << format as u32) != 0
    }

    /// Number of supported formats.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_ordinals_round_trip() {
        for (i, format) in TexFormat::ALL.iter().enumerate() {
            assert_eq!(*format as u32, i as u32 + 1);
            assert_eq!(TexFormat::from_ordinal(*format as u32), Some(*format));
        }
        assert_eq!(TexFormat::from_ordinal(0), Some(TexFormat::None));
        assert_eq!(TexFormat::from_ordinal(43), None);
    }

    #[test]
    fn test_compressed_start() {
        assert!(!TexFormat::R8g8.is_compressed());
        assert!(TexFormat::Bc1RgbSrgb.is_compressed());
        assert!(TexFormat::AtcRgba.is_compressed());
        assert_eq!(TexFormat::Bc7Rgba.block_px(), 4);
        assert_eq!(TexFormat::Rgba128.block_px(), 1);
    }

    #[test]
    fn test_memory_matches_pitch_times_rows() {
        for format in TexFormat::ALL {
            for (w, h) in [(1, 1), (3, 5), (4, 4), (17, 9), (128, 64), (1000, 3)] {
                let rows = u32::div_ceil(h, format.block_px());
                assert_eq!(
                    format.memory(w, h),
                    Some(format.pitch(w) * u64::from(rows)),
                    "{format:?} {w}x{h}"
                );
            }
        }
    }

    #[rstest]
    #[case(TexFormat::Rgba32, 16, 16, 1024)]
    #[case(TexFormat::R8, 3, 3, 9)]
    #[case(TexFormat::Bc1Rgb, 5, 5, 32)]
    #[case(TexFormat::Bc7Rgba, 4, 4, 16)]
    #[case(TexFormat::Rgba128, 2, 2, 64)]
    #[case(TexFormat::None, 8, 8, 0)]
    fn test_memory(#[case] format: TexFormat, #[case] w: u32, #[case] h: u32, #[case] bytes: u64) {
        assert_eq!(format.memory(w, h), Some(bytes));
    }

    #[test]
    fn test_memory_past_four_gigabytes() {
        assert_eq!(TexFormat::Rgba128.memory(16384, 16384), Some(1 << 32));
        assert_eq!(TexFormat::R8.memory(u32::MAX, u32::MAX), Some(0xFFFF_FFFE_0000_0001));
        assert_eq!(TexFormat::Rgba32.memory(u32::MAX, u32::MAX), None);
    }

    #[test]
    fn test_mip_count_matches_log2() {
        for (w, h) in [(1, 1), (2, 1), (3, 7), (128, 64), (800, 600), (4096, 1)] {
            let expected = (w.max(h) as f64).log2().floor() as u32 + 1;
            assert_eq!(mip_count(w, h), expected, "{w}x{h}");
            assert_eq!(mip_dimensions(w, h, expected - 1), (1, 1), "{w}x{h}");
        }
    }

    #[test]
    fn test_mip_dimensions_clamp() {
        assert_eq!(mip_dimensions(128, 64, 0), (128, 64));
        assert_eq!(mip_dimensions(128, 64, 1), (64, 32));
        assert_eq!(mip_dimensions(128, 64, 7), (1, 1));
        assert_eq!(mip_dimensions(128, 64, 40), (1, 1));
    }

    #[test]
    fn test_srgb_target() {
        assert_eq!(TexFormat::Rgba32Linear.srgb_target(), TexFormat::Rgba32);
        assert_eq!(TexFormat::Bgra32Linear.srgb_target(), TexFormat::Bgra32);
        assert_eq!(TexFormat::Rgba128.srgb_target(), TexFormat::Rgba128);
    }

    #[test]
    fn test_vertex_format_sizes() {
        assert_eq!(VertexFormat::F64.size(), 8);
        assert_eq!(VertexFormat::Ui16n.size(), 2);
        assert_eq!(VertexFormat::from_i32(12), Some(VertexFormat::Ui8));
        assert_eq!(VertexFormat::from_i32(16), None);
    }

    #[test]
    fn test_format_support_probe() {
        let support = FormatSupport::probe(|f| !f.is_compressed());
        assert!(support.contains(TexFormat::Rgba32));
        assert!(!support.contains(TexFormat::Bc1Rgb));
        assert!(!support.contains(TexFormat::None));
        assert_eq!(support.len(), 19);
    }
}

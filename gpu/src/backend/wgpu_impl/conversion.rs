//! Type conversions between portable types and wgpu types.

use crate::config::WgpuBackendType;
use crate::format::TexFormat;
use crate::types::{
    BufferType, Cull, DepthTest, SamplerSettings, TexAddress, TexSample, TexType, TextureDesc,
    Transparency, Usage,
};

/// Convert a portable texture format to wgpu, if wgpu has it at all.
///
/// PVRTC and ATC have no wgpu equivalent.
pub fn convert_texture_format(format: TexFormat) -> Option<wgpu::TextureFormat> {
    use wgpu::{AstcBlock, AstcChannel, TextureFormat as F};

    Some(match format {
        TexFormat::None => return None,

        // 8-bit per channel color
        TexFormat::Rgba32 => F::Rgba8UnormSrgb,
        TexFormat::Rgba32Linear => F::Rgba8Unorm,
        TexFormat::Bgra32 => F::Bgra8UnormSrgb,
        TexFormat::Bgra32Linear => F::Bgra8Unorm,
        TexFormat::R8 => F::R8Unorm,
        TexFormat::R8g8 => F::Rg8Unorm,

        // Packed and wide color
        TexFormat::Rg11b10 => F::Rg11b10Float,
        TexFormat::Rgb10a2 => F::Rgb10a2Unorm,
        TexFormat::Rgba64u => F::Rgba16Uint,
        TexFormat::Rgba64s => F::Rgba16Sint,
        TexFormat::Rgba64f => F::Rgba16Float,
        TexFormat::Rgba128 => F::Rgba32Float,
        TexFormat::R16u => F::R16Uint,
        TexFormat::R16s => F::R16Sint,
        TexFormat::R16f => F::R16Float,
        TexFormat::R32 => F::R32Float,

        // Depth/stencil formats
        TexFormat::DepthStencil => F::Depth24PlusStencil8,
        TexFormat::Depth32 => F::Depth32Float,
        TexFormat::Depth16 => F::Depth16Unorm,

        // BC
        TexFormat::Bc1RgbSrgb => F::Bc1RgbaUnormSrgb,
        TexFormat::Bc1Rgb => F::Bc1RgbaUnorm,
        TexFormat::Bc3RgbaSrgb => F::Bc3RgbaUnormSrgb,
        TexFormat::Bc3Rgba => F::Bc3RgbaUnorm,
        TexFormat::Bc4R => F::Bc4RUnorm,
        TexFormat::Bc5Rg => F::Bc5RgUnorm,
        TexFormat::Bc7RgbaSrgb => F::Bc7RgbaUnormSrgb,
        TexFormat::Bc7Rgba => F::Bc7RgbaUnorm,

        // ETC / EAC
        TexFormat::Etc1Rgb => F::Etc2Rgb8Unorm,
        TexFormat::Etc2RgbaSrgb => F::Etc2Rgba8UnormSrgb,
        TexFormat::Etc2Rgba => F::Etc2Rgba8Unorm,
        TexFormat::Etc2R11 => F::EacR11Unorm,
        TexFormat::Etc2Rg11 => F::EacRg11Unorm,

        // ASTC
        TexFormat::Astc4x4RgbaSrgb => F::Astc {
            block: AstcBlock::B4x4,
            channel: AstcChannel::UnormSrgb,
        },
        TexFormat::Astc4x4Rgba => F::Astc {
            block: AstcBlock::B4x4,
            channel: AstcChannel::Unorm,
        },

        TexFormat::Pvrtc1RgbSrgb
        | TexFormat::Pvrtc1Rgb
        | TexFormat::Pvrtc1RgbaSrgb
        | TexFormat::Pvrtc1Rgba
        | TexFormat::Pvrtc2RgbaSrgb
        | TexFormat::Pvrtc2Rgba
        | TexFormat::AtcRgb
        | TexFormat::AtcRgba => return None,
    })
}

/// Inverse of [`convert_texture_format`]; unmapped formats give `None`.
pub fn convert_texture_format_back(format: wgpu::TextureFormat) -> TexFormat {
    TexFormat::ALL
        .iter()
        .copied()
        .find(|f| convert_texture_format(*f) == Some(format))
        .unwrap_or(TexFormat::None)
}

/// Usage flags for the backing texture of `desc`.
pub fn convert_texture_usage(desc: &TextureDesc, hardware_mips: bool) -> wgpu::TextureUsages {
    use wgpu::TextureUsages as U;

    if desc.multisample > 1 {
        return U::RENDER_ATTACHMENT | U::TEXTURE_BINDING;
    }
    let mut usage = U::TEXTURE_BINDING | U::COPY_DST | U::COPY_SRC;
    if matches!(desc.ty, TexType::RenderTarget | TexType::Depth) || hardware_mips {
        usage |= U::RENDER_ATTACHMENT;
    }
    if desc.usage.contains(Usage::COMPUTE_WRITE) {
        usage |= U::STORAGE_BINDING;
    }
    usage
}

/// Usage flags for a buffer of this type.
pub fn convert_buffer_usage(ty: BufferType, usage: Usage) -> wgpu::BufferUsages {
    use wgpu::BufferUsages as U;

    let mut result = U::COPY_DST | U::COPY_SRC;
    result |= match ty {
        BufferType::Vertex => U::VERTEX,
        BufferType::Index => U::INDEX,
        BufferType::Constant => U::UNIFORM,
        BufferType::Compute => U::STORAGE,
    };
    if usage.intersects(Usage::COMPUTE_READ | Usage::COMPUTE_WRITE) {
        result |= U::STORAGE;
    }
    result
}

/// Backends bitmask for the requested wgpu backend.
pub fn convert_backends(backend: WgpuBackendType) -> wgpu::Backends {
    match backend {
        WgpuBackendType::Auto => wgpu::Backends::all(),
        WgpuBackendType::Vulkan => wgpu::Backends::VULKAN,
        WgpuBackendType::Metal => wgpu::Backends::METAL,
        WgpuBackendType::Dx12 => wgpu::Backends::DX12,
        WgpuBackendType::Gl => wgpu::Backends::GL,
    }
}

/// Convert an address mode.
pub fn convert_address_mode(address: TexAddress) -> wgpu::AddressMode {
    match address {
        TexAddress::Repeat => wgpu::AddressMode::Repeat,
        TexAddress::Clamp => wgpu::AddressMode::ClampToEdge,
        TexAddress::Mirror => wgpu::AddressMode::MirrorRepeat,
    }
}

/// Build a sampler descriptor from portable sampler settings.
///
/// Anisotropic filtering is linear filtering with a clamp above 1.
pub fn convert_sampler(settings: &SamplerSettings) -> wgpu::SamplerDescriptor<'static> {
    let address = convert_address_mode(settings.address);
    let filter = match settings.sample {
        TexSample::Point => wgpu::FilterMode::Nearest,
        TexSample::Linear | TexSample::Anisotropic => wgpu::FilterMode::Linear,
    };
    let anisotropy_clamp = match settings.sample {
        TexSample::Anisotropic => settings.anisotropy.clamp(1, 16) as u16,
        _ => 1,
    };
    wgpu::SamplerDescriptor {
        label: None,
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: filter,
        anisotropy_clamp,
        ..Default::default()
    }
}

/// Convert a depth test to a compare function.
pub fn convert_compare(test: DepthTest) -> wgpu::CompareFunction {
    match test {
        DepthTest::Less => wgpu::CompareFunction::Less,
        DepthTest::LessOrEq => wgpu::CompareFunction::LessEqual,
        DepthTest::Greater => wgpu::CompareFunction::Greater,
        DepthTest::GreaterOrEq => wgpu::CompareFunction::GreaterEqual,
        DepthTest::Equal => wgpu::CompareFunction::Equal,
        DepthTest::NotEqual => wgpu::CompareFunction::NotEqual,
        DepthTest::Always => wgpu::CompareFunction::Always,
        DepthTest::Never => wgpu::CompareFunction::Never,
    }
}

/// Blend state for a transparency mode. Alpha-to-coverage blends nothing.
pub fn convert_blend(transparency: Transparency) -> Option<wgpu::BlendState> {
    use wgpu::{BlendComponent, BlendFactor, BlendOperation};

    match transparency {
        Transparency::None | Transparency::AlphaToCoverage => None,
        Transparency::Blend => Some(wgpu::BlendState {
            color: BlendComponent {
                src_factor: BlendFactor::SrcAlpha,
                dst_factor: BlendFactor::OneMinusSrcAlpha,
                operation: BlendOperation::Add,
            },
            alpha: BlendComponent {
                src_factor: BlendFactor::One,
                dst_factor: BlendFactor::One,
                operation: BlendOperation::Max,
            },
        }),
        Transparency::Add => Some(wgpu::BlendState {
            color: BlendComponent {
                src_factor: BlendFactor::One,
                dst_factor: BlendFactor::One,
                operation: BlendOperation::Add,
            },
            alpha: BlendComponent {
                src_factor: BlendFactor::One,
                dst_factor: BlendFactor::One,
                operation: BlendOperation::Add,
            },
        }),
    }
}

/// Convert a cull mode. Front faces wind counter-clockwise.
pub fn convert_cull(cull: Cull) -> Option<wgpu::Face> {
    match cull {
        Cull::Back => Some(wgpu::Face::Back),
        Cull::Front => Some(wgpu::Face::Front),
        Cull::None => None,
    }
}

/// Aspect that holds the readable depth of a depth format.
pub fn depth_aspect(format: TexFormat) -> wgpu::TextureAspect {
    if format.is_depth() {
        wgpu::TextureAspect::DepthOnly
    } else {
        wgpu::TextureAspect::All
    }
}

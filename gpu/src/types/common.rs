//! Shared binding and capability types.

use bitflags::bitflags;

bitflags! {
    /// Shader stages a binding is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StageBits: u8 {
        const VERTEX = 1 << 0;
        const PIXEL = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

/// Kind of register a binding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum RegisterType {
    /// Resolved from the resource's own type.
    #[default]
    Default = 0,
    Vertex,
    Index,
    Constant,
    /// Read-only shader resource.
    Resource,
    /// Read-write (unordered access) resource.
    ReadWrite,
}

impl RegisterType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Default,
            1 => Self::Vertex,
            2 => Self::Index,
            3 => Self::Constant,
            4 => Self::Resource,
            5 => Self::ReadWrite,
            _ => return None,
        })
    }
}

/// A binding point: slot, visible stages and register kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bind {
    pub slot: u16,
    pub stage_bits: StageBits,
    pub register_type: RegisterType,
}

impl Bind {
    pub fn new(slot: u16, stage_bits: StageBits, register_type: RegisterType) -> Self {
        Self { slot, stage_bits, register_type }
    }
}

/// Integer rectangle used for viewports and scissors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle covering a `width` x `height` surface from the origin.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }
}

/// Optional features a backend may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Render target layers can be selected from the vertex stage.
    TexLayerSelect,
    Wireframe,
    TiledMultisample,
    FmtPvrtc1,
    FmtPvrtc2,
    FmtAstc,
    FmtAtc,
    Multiview,
    MultiviewTiledMultisample,
}

/// Shading language of a compiled stage blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ShaderLanguage {
    Hlsl = 0,
    Spirv,
    Glsl,
    GlslEs,
    GlslWeb,
}

impl ShaderLanguage {
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::Hlsl,
            1 => Self::Spirv,
            2 => Self::Glsl,
            3 => Self::GlslEs,
            4 => Self::GlslWeb,
            _ => return None,
        })
    }
}

//! Buffer types and descriptors.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use super::common::StageBits;

bitflags! {
    /// How a buffer or texture is used over its lifetime.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Usage: u32 {
        /// Contents are set once at creation.
        const STATIC = 1 << 0;
        /// Contents are replaced from the CPU with write-discard semantics.
        const DYNAMIC = 1 << 2;
        /// Readable from compute shaders.
        const COMPUTE_READ = 1 << 3;
        /// Writable from compute shaders.
        const COMPUTE_WRITE = 1 << 4;
    }
}

impl Default for Usage {
    fn default() -> Self {
        Self::STATIC
    }
}

impl Usage {
    /// Whether the CPU may rewrite contents after creation.
    pub fn is_dynamic(self) -> bool {
        self.contains(Self::DYNAMIC)
    }
}

/// What a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    Vertex,
    Index,
    Constant,
    /// Structured buffer for compute shaders.
    Compute,
}

/// Descriptor passed to the backend when creating a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub ty: BufferType,
    pub usage: Usage,
    /// Size of one element in bytes.
    pub stride: u32,
    /// Number of elements.
    pub count: u32,
}

impl BufferDesc {
    pub fn new(ty: BufferType, usage: Usage, count: u32, stride: u32) -> Self {
        Self { ty, usage, stride, count }
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        self.count as u64 * self.stride as u64
    }
}

/// Resolved binding point for a buffer, handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    Vertex { slot: u16, stride: u32 },
    /// Index buffers are always 32-bit unsigned.
    Index,
    Constant { slot: u16, stages: StageBits },
    /// Read-only structured view.
    Resource { slot: u16, stages: StageBits },
    /// Read-write structured view.
    ReadWrite { slot: u16, stages: StageBits },
}

/// Standard vertex consumed by meshes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub norm: [f32; 3],
    pub uv: [f32; 2],
    /// RGBA8 color.
    pub col: [u8; 4],
}

impl Vertex {
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn new(pos: [f32; 3], norm: [f32; 3], uv: [f32; 2], col: [u8; 4]) -> Self {
        Self { pos, norm, uv, col }
    }
}

static_assertions::const_assert_eq!(std::mem::size_of::<Vertex>(), 36);

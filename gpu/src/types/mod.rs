//! Common types and descriptors for GPU resources.
//!
//! This module contains usage flags, binding descriptions and descriptor
//! structs shared by the front-end resources and every backend.

mod buffer;
mod common;
mod pipeline;
mod texture;

pub use buffer::{BufferDesc, BufferSlot, BufferType, Usage, Vertex};
pub use common::{Bind, Capability, Rect, RegisterType, ShaderLanguage, StageBits};
pub use pipeline::{Cull, DepthTest, PipelineState, StateChange, StateGroup, Transparency};
pub use texture::{MipPolicy, SamplerSettings, TexAddress, TexSample, TexType, TextureDesc};

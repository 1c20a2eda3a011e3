//! GPU resources.
//!
//! This module contains the resource types created by [`Device`]:
//! - [`Buffer`] - vertex, index, constant or compute buffer
//! - [`Texture`] - image, cubemap, render target or depth texture
//! - [`Mesh`] - vertex and index buffer pair
//! - [`Pipeline`] - shader plus fixed-function state
//! - [`Compute`] - compute kernel
//!
//! Resources are reference-counted with [`Arc`] and can be shared across threads.
//! Each resource holds a strong reference to its parent device.
//!
//! [`Device`]: crate::Device
//! [`Arc`]: std::sync::Arc

mod buffer;
pub mod downsample;
mod mesh;
mod pipeline;
mod texture;

pub use buffer::Buffer;
pub use mesh::Mesh;
pub use pipeline::{Compute, Pipeline};
pub use texture::Texture;

//! # RedLilium GPU
//!
//! Thin cross-backend GPU layer with an immediate-mode API.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Device`] - explicit context that creates resources and issues draws
//! - [`Buffer`], [`Texture`], [`Mesh`], [`Shader`], [`Pipeline`], [`Compute`]
//!   and [`Swapchain`] resources, shared as `Arc`s
//! - [`shader::file`] - loader and writer for the `.sks` shader container
//! - [`backend`] - the [`GpuBackend`](backend::GpuBackend) trait with a
//!   wgpu backend (`wgpu-backend` feature) and an always-available null
//!   backend for headless use and tests
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_gpu::{Device, DeviceParameters, TexFormat, TexType, MipPolicy, Usage};
//!
//! let device = Device::new(DeviceParameters::new())?;
//! let target = device.create_texture(TexType::RenderTarget, Usage::STATIC, TexFormat::Rgba32, MipPolicy::None)?;
//! target.set_contents_arr(&[], 1, 1, 256, 256, 1);
//!
//! device.draw_begin();
//! device.target_bind(Some(&target), -1, 0);
//! device.target_clear(true, Some([0.1, 0.1, 0.1, 1.0]));
//! pipeline.bind();
//! mesh.bind();
//! device.draw(0, 0, mesh.index_count(), 1);
//! ```

#[macro_use]
mod diagnostics;

pub mod backend;
pub mod config;
mod deferred;
pub mod device;
pub mod error;
pub mod file;
pub mod format;
pub mod resources;
pub mod shader;
pub mod state;
pub mod swapchain;
pub mod types;

// Re-export main types for convenience
pub use backend::{BackendStats, NativeFormat, NativeTexture, has_gpu_backend};
pub use config::{AdapterSelector, BackendType, DeviceParameters, WgpuBackendType};
pub use device::Device;
pub use diagnostics::{LogCallback, LogLevel, set_log_callback};
pub use error::GpuError;
pub use file::{FileReader, set_file_reader};
pub use format::{FormatSupport, Semantic, TexFormat, VertexFormat, mip_count, mip_dimensions};
pub use resources::{Buffer, Compute, Mesh, Pipeline, Texture};
pub use shader::{Shader, ShaderMeta};
pub use state::TargetBinding;
pub use swapchain::{Swapchain, SwapchainWindow};
pub use types::{
    Bind, BufferDesc, BufferType, Capability, Cull, DepthTest, MipPolicy, Rect, RegisterType,
    SamplerSettings, ShaderLanguage, StageBits, TexAddress, TexSample, TexType, TextureDesc,
    Transparency, Usage, Vertex,
};

/// GPU library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_null_backend_is_always_available() {
        let device = Device::new(DeviceParameters::new().with_backend(BackendType::Null)).unwrap();
        assert_eq!(device.shader_language(), ShaderLanguage::Hlsl);
        assert!(device.backend_stats().is_some());
    }
}

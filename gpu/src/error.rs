//! GPU error types.

use std::fmt;

use crate::format::TexFormat;

/// Errors that can occur in the GPU abstraction layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// No compatible adapter or context could be created.
    DeviceInitFailed(String),
    /// The driver failed to create a buffer, texture, shader or view.
    ResourceCreationFailed(String),
    /// The API was used in a way the resource does not allow.
    Misuse(String),
    /// The texture format is not supported by the active backend.
    FormatUnsupported(TexFormat),
    /// A shader binary was malformed or had no stage for the active backend.
    ShaderFormat(String),
    /// The operation is not supported for this resource.
    Unsupported(String),
    /// A file could not be read through the file hook.
    FileNotFound(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceInitFailed(msg) => write!(f, "device initialization failed: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::Misuse(msg) => write!(f, "misuse: {msg}"),
            Self::FormatUnsupported(format) => write!(f, "texture format {format:?} is not supported"),
            Self::ShaderFormat(msg) => write!(f, "invalid shader binary: {msg}"),
            Self::Unsupported(msg) => write!(f, "unsupported operation: {msg}"),
            Self::FileNotFound(path) => write!(f, "file not found: {path}"),
        }
    }
}

impl std::error::Error for GpuError {}

//! Shaders and their reflection metadata.

pub mod file;
mod meta;

use std::sync::Arc;

pub use meta::{
    GLOBAL_BUFFER_NAME, ShaderBuffer, ShaderMeta, ShaderOps, ShaderResource, ShaderVar,
    ShaderVarType, VertexInput, hash_name,
};

use crate::backend::GpuShader;
use crate::device::Device;
use crate::types::{Bind, StageBits};

/// Compiled shader stages plus shared reflection metadata.
///
/// Shaders loaded from identical `.sks` bytes on one device share a single
/// [`ShaderMeta`].
pub struct Shader {
    device: Arc<Device>,
    id: u64,
    meta: Arc<ShaderMeta>,
    stages: StageBits,
    gpu: GpuShader,
}

impl Shader {
    pub(crate) fn new(
        device: Arc<Device>,
        id: u64,
        meta: Arc<ShaderMeta>,
        gpu: GpuShader,
        stages: StageBits,
    ) -> Self {
        Self {
            device,
            id,
            meta,
            stages,
            gpu,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn meta(&self) -> &Arc<ShaderMeta> {
        &self.meta
    }

    /// Stages this shader was created with.
    pub fn stages(&self) -> StageBits {
        self.stages
    }

    /// A shader is usable with a vertex+pixel pair or a compute stage.
    pub fn is_valid(&self) -> bool {
        self.stages.contains(StageBits::VERTEX | StageBits::PIXEL)
            || self.stages.contains(StageBits::COMPUTE)
    }

    pub(crate) fn gpu(&self) -> &GpuShader {
        &self.gpu
    }

    pub fn get_bind(&self, name: &str) -> Option<Bind> {
        self.meta.get_bind(name)
    }

    pub fn var_count(&self) -> usize {
        self.meta.var_count()
    }

    pub fn var_index(&self, name: &str) -> Option<usize> {
        self.meta.var_index(name)
    }

    pub fn var_info(&self, index: usize) -> Option<&ShaderVar> {
        self.meta.var_info(index)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        log::trace!("Shader {} '{}': destroyed", self.id, self.meta.name);
        self.device.forget(self.id);
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.id)
            .field("name", &self.meta.name)
            .field("stages", &self.stages)
            .finish()
    }
}

static_assertions::assert_impl_all!(Shader: Send, Sync);

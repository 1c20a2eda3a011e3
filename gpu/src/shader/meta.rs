//! Shader reflection metadata.
//!
//! A [`ShaderMeta`] describes the constant buffers, resources and vertex
//! inputs of one compiled shader. It is shared through `Arc` by every
//! shader and pipeline built from the same compiled unit.

use crate::format::{Semantic, VertexFormat};
use crate::types::Bind;

/// Name of the constant buffer that holds loose shader parameters.
pub const GLOBAL_BUFFER_NAME: &str = "$Global";

/// 64-bit FNV-1a hash used for all metadata name lookups.
pub fn hash_name(name: &str) -> u64 {
    hash_bytes(name.as_bytes())
}

pub(crate) fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 14695981039346656037;
    for byte in bytes {
        hash = (hash ^ *byte as u64).wrapping_mul(1099511628211);
    }
    hash
}

/// Scalar type of a shader variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum ShaderVarType {
    #[default]
    None = 0,
    Int,
    Uint,
    Uint8,
    Float,
    Double,
}

impl ShaderVarType {
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0 => Self::None,
            1 => Self::Int,
            2 => Self::Uint,
            3 => Self::Uint8,
            4 => Self::Float,
            5 => Self::Double,
            _ => return None,
        })
    }
}

/// One variable inside a constant buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderVar {
    pub name: String,
    pub name_hash: u64,
    /// Free-form tag string emitted by the compiler.
    pub extra: String,
    pub offset: u32,
    pub size: u32,
    pub ty: ShaderVarType,
    pub type_count: u16,
}

impl ShaderVar {
    pub fn new(name: impl Into<String>, offset: u32, size: u32, ty: ShaderVarType, type_count: u16) -> Self {
        let name = name.into();
        Self {
            name_hash: hash_name(&name),
            name,
            extra: String::new(),
            offset,
            size,
            ty,
            type_count,
        }
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }
}

/// A constant buffer declared by the shader.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderBuffer {
    pub name: String,
    pub name_hash: u64,
    pub bind: Bind,
    pub size: u32,
    /// Default contents, when the compiler provided them.
    pub defaults: Option<Vec<u8>>,
    pub vars: Vec<ShaderVar>,
}

impl ShaderBuffer {
    pub fn new(name: impl Into<String>, bind: Bind, size: u32) -> Self {
        let name = name.into();
        Self {
            name_hash: hash_name(&name),
            name,
            bind,
            size,
            defaults: None,
            vars: Vec::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: Vec<u8>) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn with_var(mut self, var: ShaderVar) -> Self {
        self.vars.push(var);
        self
    }
}

/// A texture (or other resource) declared by the shader.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderResource {
    pub name: String,
    pub name_hash: u64,
    /// Default value hint, such as "white".
    pub value: String,
    pub tags: String,
    pub bind: Bind,
}

impl ShaderResource {
    pub fn new(name: impl Into<String>, bind: Bind) -> Self {
        let name = name.into();
        Self {
            name_hash: hash_name(&name),
            name,
            value: String::new(),
            tags: String::new(),
            bind,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }
}

/// Per-stage instruction counters reported by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShaderOps {
    pub total: i32,
    pub tex_read: i32,
    pub dynamic_flow: i32,
}

/// One vertex input the shader consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexInput {
    pub format: VertexFormat,
    pub semantic: Semantic,
    pub semantic_slot: u8,
}

/// Reflection data for one compiled shader.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderMeta {
    pub name: String,
    pub buffers: Vec<ShaderBuffer>,
    pub resources: Vec<ShaderResource>,
    pub vertex_inputs: Vec<VertexInput>,
    pub ops_vertex: ShaderOps,
    pub ops_pixel: ShaderOps,
    global_buffer: Option<usize>,
}

impl ShaderMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_buffer(mut self, buffer: ShaderBuffer) -> Self {
        self.buffers.push(buffer);
        self.refresh_global();
        self
    }

    pub fn with_resource(mut self, resource: ShaderResource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_vertex_input(mut self, input: VertexInput) -> Self {
        self.vertex_inputs.push(input);
        self
    }

    /// Re-locate the `$Global` buffer after `buffers` was edited directly.
    ///
    /// If several buffers carry the name, the last one wins.
    pub fn refresh_global(&mut self) {
        self.global_buffer = self.buffers.iter().rposition(|b| b.name == GLOBAL_BUFFER_NAME);
    }

    /// Index of the `$Global` buffer, if the shader has one.
    pub fn global_buffer_id(&self) -> Option<usize> {
        self.global_buffer
    }

    pub fn global_buffer(&self) -> Option<&ShaderBuffer> {
        self.global_buffer.and_then(|i| self.buffers.get(i))
    }

    /// Binding of a buffer or resource by name. Buffers are searched first.
    pub fn get_bind(&self, name: &str) -> Option<Bind> {
        let hash = hash_name(name);
        self.buffers
            .iter()
            .find(|b| b.name_hash == hash)
            .map(|b| b.bind)
            .or_else(|| self.resources.iter().find(|r| r.name_hash == hash).map(|r| r.bind))
    }

    /// Number of variables in the `$Global` buffer.
    pub fn var_count(&self) -> usize {
        self.global_buffer().map_or(0, |b| b.vars.len())
    }

    /// Index of a `$Global` variable by name.
    pub fn var_index(&self, name: &str) -> Option<usize> {
        self.var_index_hashed(hash_name(name))
    }

    pub fn var_index_hashed(&self, name_hash: u64) -> Option<usize> {
        self.global_buffer()?.vars.iter().position(|v| v.name_hash == name_hash)
    }

    /// Variable description for a `$Global` variable index.
    pub fn var_info(&self, index: usize) -> Option<&ShaderVar> {
        self.global_buffer()?.vars.get(index)
    }
}

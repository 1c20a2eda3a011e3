//! SPIR-V reflection through naga.
//!
//! Stage blobs carry their bindings in descriptor sets that follow the
//! register classes of the portable [`Bind`](crate::types::Bind):
//!
//! | set | register | contents                                  |
//! |-----|----------|-------------------------------------------|
//! | 0   | `b#`     | constant buffers                          |
//! | 1   | `t#`     | sampled textures and read-only buffers    |
//! | 2   | `s#`     | the sampler of the texture at the same `t#` |
//! | 3   | `u#`     | read-write buffers and storage textures   |
//!
//! Reflection turns each stage into explicit bind group layout entries, so a
//! pipeline layout never depends on which bindings the compiler kept.

use crate::error::GpuError;

/// Descriptor set of constant buffers.
pub const GROUP_CONSTANT: u32 = 0;
/// Descriptor set of sampled textures and read-only buffers.
pub const GROUP_RESOURCE: u32 = 1;
/// Descriptor set of samplers.
pub const GROUP_SAMPLER: u32 = 2;
/// Descriptor set of read-write resources.
pub const GROUP_READ_WRITE: u32 = 3;

/// Bindings and inputs of one or more stages.
#[derive(Debug, Default, Clone)]
pub struct Reflection {
    /// Layout entries per descriptor set, indexed by set number.
    pub groups: Vec<Vec<wgpu::BindGroupLayoutEntry>>,
    /// Vertex input locations, empty for non-vertex stages.
    pub vertex_locations: Vec<u32>,
}

impl Reflection {
    /// Reflect one SPIR-V stage.
    pub fn from_spirv(
        name: &str,
        code: &[u8],
        visibility: wgpu::ShaderStages,
    ) -> Result<Self, GpuError> {
        let module = naga::front::spv::parse_u8_slice(code, &naga::front::spv::Options::default())
            .map_err(|e| GpuError::ShaderFormat(format!("{name}: SPIR-V parse error: {e}")))?;

        let mut reflection = Self::default();
        for (_, var) in module.global_variables.iter() {
            let Some(binding) = &var.binding else {
                continue;
            };
            let ty = binding_type(&module, var)
                .ok_or_else(|| {
                    GpuError::ShaderFormat(format!(
                        "{name}: unsupported resource at set {} binding {}",
                        binding.group, binding.binding
                    ))
                })?;
            reflection.insert(
                binding.group,
                wgpu::BindGroupLayoutEntry {
                    binding: binding.binding,
                    visibility,
                    ty,
                    count: None,
                },
            );
        }

        if visibility.contains(wgpu::ShaderStages::VERTEX) {
            for entry in module
                .entry_points
                .iter()
                .filter(|ep| ep.stage == naga::ShaderStage::Vertex)
            {
                for arg in &entry.function.arguments {
                    collect_locations(&module, arg.ty, arg.binding.as_ref(), &mut reflection.vertex_locations);
                }
            }
            reflection.vertex_locations.sort_unstable();
            reflection.vertex_locations.dedup();
        }
        Ok(reflection)
    }

    fn insert(&mut self, group: u32, entry: wgpu::BindGroupLayoutEntry) {
        let group = group as usize;
        if self.groups.len() <= group {
            self.groups.resize_with(group + 1, Vec::new);
        }
        let entries = &mut self.groups[group];
        match entries.iter_mut().find(|e| e.binding == entry.binding) {
            Some(existing) => existing.visibility |= entry.visibility,
            None => entries.push(entry),
        }
    }

    /// Fold another stage into this one, widening shared bindings' visibility.
    pub fn merge(&mut self, other: Reflection) {
        for (group, entries) in other.groups.into_iter().enumerate() {
            for entry in entries {
                self.insert(group as u32, entry);
            }
        }
        self.vertex_locations.extend(other.vertex_locations);
        self.vertex_locations.sort_unstable();
        self.vertex_locations.dedup();
    }
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<u32>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push(*location),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn binding_type(module: &naga::Module, var: &naga::GlobalVariable) -> Option<wgpu::BindingType> {
    match var.space {
        naga::AddressSpace::Uniform => Some(wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        }),
        naga::AddressSpace::Storage { access } => Some(wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage {
                read_only: !access.contains(naga::StorageAccess::STORE),
            },
            has_dynamic_offset: false,
            min_binding_size: None,
        }),
        naga::AddressSpace::Handle => handle_type(&module.types[var.ty].inner),
        _ => None,
    }
}

fn handle_type(inner: &naga::TypeInner) -> Option<wgpu::BindingType> {
    match *inner {
        naga::TypeInner::Sampler { comparison } => Some(wgpu::BindingType::Sampler(if comparison {
            wgpu::SamplerBindingType::Comparison
        } else {
            wgpu::SamplerBindingType::Filtering
        })),
        naga::TypeInner::Image {
            dim,
            arrayed,
            class,
        } => {
            let view_dimension = view_dimension(dim, arrayed);
            Some(match class {
                naga::ImageClass::Sampled { kind, multi } => wgpu::BindingType::Texture {
                    sample_type: match kind {
                        naga::ScalarKind::Sint => wgpu::TextureSampleType::Sint,
                        naga::ScalarKind::Uint => wgpu::TextureSampleType::Uint,
                        _ => wgpu::TextureSampleType::Float { filterable: !multi },
                    },
                    view_dimension,
                    multisampled: multi,
                },
                naga::ImageClass::Depth { multi } => wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension,
                    multisampled: multi,
                },
                naga::ImageClass::Storage { format, access } => wgpu::BindingType::StorageTexture {
                    access: storage_access(access),
                    format: storage_format(format)?,
                    view_dimension,
                },
            })
        }
        _ => None,
    }
}

fn view_dimension(dim: naga::ImageDimension, arrayed: bool) -> wgpu::TextureViewDimension {
    match (dim, arrayed) {
        (naga::ImageDimension::D1, _) => wgpu::TextureViewDimension::D1,
        (naga::ImageDimension::D2, false) => wgpu::TextureViewDimension::D2,
        (naga::ImageDimension::D2, true) => wgpu::TextureViewDimension::D2Array,
        (naga::ImageDimension::D3, _) => wgpu::TextureViewDimension::D3,
        (naga::ImageDimension::Cube, false) => wgpu::TextureViewDimension::Cube,
        (naga::ImageDimension::Cube, true) => wgpu::TextureViewDimension::CubeArray,
    }
}

fn storage_access(access: naga::StorageAccess) -> wgpu::StorageTextureAccess {
    let load = access.contains(naga::StorageAccess::LOAD);
    let store = access.contains(naga::StorageAccess::STORE);
    match (load, store) {
        (true, true) => wgpu::StorageTextureAccess::ReadWrite,
        (true, false) => wgpu::StorageTextureAccess::ReadOnly,
        _ => wgpu::StorageTextureAccess::WriteOnly,
    }
}

fn storage_format(format: naga::StorageFormat) -> Option<wgpu::TextureFormat> {
    use naga::StorageFormat as S;
    use wgpu::TextureFormat as F;

    Some(match format {
        S::R32Float => F::R32Float,
        S::R32Uint => F::R32Uint,
        S::R32Sint => F::R32Sint,
        S::Rg32Float => F::Rg32Float,
        S::Rgba8Unorm => F::Rgba8Unorm,
        S::Rgba8Snorm => F::Rgba8Snorm,
        S::Rgba8Uint => F::Rgba8Uint,
        S::Rgba8Sint => F::Rgba8Sint,
        S::Rgba16Float => F::Rgba16Float,
        S::Rgba16Uint => F::Rgba16Uint,
        S::Rgba16Sint => F::Rgba16Sint,
        S::Rgba32Float => F::Rgba32Float,
        S::Rgba32Uint => F::Rgba32Uint,
        S::Rgba32Sint => F::Rgba32Sint,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }

    #[test]
    fn test_merge_widens_visibility() {
        let mut vertex = Reflection::default();
        vertex.insert(GROUP_CONSTANT, uniform(1, wgpu::ShaderStages::VERTEX));
        vertex.vertex_locations = vec![0, 2];

        let mut pixel = Reflection::default();
        pixel.insert(GROUP_CONSTANT, uniform(1, wgpu::ShaderStages::FRAGMENT));
        pixel.insert(GROUP_READ_WRITE, uniform(0, wgpu::ShaderStages::FRAGMENT));

        vertex.merge(pixel);
        assert_eq!(vertex.groups.len(), 4);
        assert_eq!(vertex.groups[0].len(), 1);
        assert_eq!(vertex.groups[0][0].visibility, wgpu::ShaderStages::VERTEX_FRAGMENT);
        assert!(vertex.groups[1].is_empty());
        assert_eq!(vertex.vertex_locations, vec![0, 2]);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = Reflection::from_spirv("bad", b"not spirv", wgpu::ShaderStages::VERTEX).unwrap_err();
        assert!(matches!(err, GpuError::ShaderFormat(_)));
    }

    #[test]
    fn test_storage_access() {
        assert_eq!(
            storage_access(naga::StorageAccess::LOAD | naga::StorageAccess::STORE),
            wgpu::StorageTextureAccess::ReadWrite
        );
        assert_eq!(storage_access(naga::StorageAccess::STORE), wgpu::StorageTextureAccess::WriteOnly);
    }
}

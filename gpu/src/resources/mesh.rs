//! Vertex and index buffer pair.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{Bind, BufferType, RegisterType, StageBits};

use super::buffer::Buffer;

/// A vertex buffer and an optional index buffer drawn together.
///
/// Meshes own no data, they only hold references to the buffers.
#[derive(Default)]
pub struct Mesh {
    vertices: Mutex<Option<Arc<Buffer>>>,
    indices: Mutex<Option<Arc<Buffer>>>,
}

fn checked(buffer: Option<&Arc<Buffer>>, ty: BufferType) -> Result<Option<Arc<Buffer>>, ()> {
    match buffer {
        Some(buffer) if buffer.ty() != ty => {
            report_critical!("Mesh expected a {ty:?} buffer, got {:?}", buffer.ty());
            Err(())
        }
        buffer => Ok(buffer.cloned()),
    }
}

impl Mesh {
    pub(crate) fn new(vertices: Option<&Arc<Buffer>>, indices: Option<&Arc<Buffer>>) -> Self {
        let mesh = Self::default();
        mesh.set_verts(vertices);
        mesh.set_inds(indices);
        mesh
    }

    /// Replace the vertex buffer. Non-vertex buffers are rejected.
    pub fn set_verts(&self, vertices: Option<&Arc<Buffer>>) {
        if let Ok(buffer) = checked(vertices, BufferType::Vertex) {
            *self.vertices.lock() = buffer;
        }
    }

    /// Replace the index buffer. Non-index buffers are rejected.
    pub fn set_inds(&self, indices: Option<&Arc<Buffer>>) {
        if let Ok(buffer) = checked(indices, BufferType::Index) {
            *self.indices.lock() = buffer;
        }
    }

    pub fn vertices(&self) -> Option<Arc<Buffer>> {
        self.vertices.lock().clone()
    }

    pub fn indices(&self) -> Option<Arc<Buffer>> {
        self.indices.lock().clone()
    }

    /// Number of indices, or 0 without an index buffer.
    pub fn index_count(&self) -> u32 {
        self.indices.lock().as_ref().map_or(0, |b| b.count())
    }

    /// Bind the vertex buffer to slot 0 and the index buffer.
    pub fn bind(&self) {
        if let Some(vertices) = self.vertices() {
            vertices.bind(Bind::new(0, StageBits::VERTEX, RegisterType::Vertex));
        }
        if let Some(indices) = self.indices() {
            indices.bind(Bind::new(0, StageBits::VERTEX, RegisterType::Index));
        }
    }
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("vertices", &self.vertices.lock().as_ref().map(|b| b.id()))
            .field("indices", &self.indices.lock().as_ref().map(|b| b.id()))
            .finish()
    }
}

static_assertions::assert_impl_all!(Mesh: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendType, DeviceParameters};
    use crate::device::Device;
    use crate::types::Usage;

    #[test]
    fn test_mesh_rejects_wrong_buffer_types() {
        let device = Device::new(DeviceParameters::new().with_backend(BackendType::Null)).unwrap();
        let verts = device
            .create_buffer(Some(&[0; 36]), 1, 36, BufferType::Vertex, Usage::STATIC)
            .unwrap();
        let inds = device
            .create_buffer(Some(&[0; 12]), 3, 4, BufferType::Index, Usage::STATIC)
            .unwrap();

        let mesh = device.create_mesh(Some(&inds), Some(&verts));
        assert!(mesh.vertices().is_none());
        assert!(mesh.indices().is_none());

        mesh.set_verts(Some(&verts));
        mesh.set_inds(Some(&inds));
        assert_eq!(mesh.index_count(), 3);

        mesh.bind();
        assert_eq!(device.backend_stats().unwrap().buffer_binds, 2);
        mesh.bind();
        assert_eq!(device.backend_stats().unwrap().buffer_binds, 2);
    }
}

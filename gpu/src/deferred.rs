//! Content updates recorded off the owning thread.
//!
//! A device belongs to the thread that created it. When another thread
//! rewrites an existing dynamic buffer or texture, the new bytes are parked
//! here and uploaded by the owner at the next
//! [`Device::draw_begin`](crate::Device::draw_begin).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{GpuBackend, GpuBuffer, GpuTexture};
use crate::types::TextureDesc;

/// One parked upload.
pub(crate) enum Update {
    Buffer {
        buffer: Arc<GpuBuffer>,
        data: Vec<u8>,
    },
    Texture {
        texture: Arc<GpuTexture>,
        desc: TextureDesc,
        layers: Vec<Vec<u8>>,
    },
}

#[derive(Default)]
pub(crate) struct UpdateQueue {
    pending: Mutex<Vec<Update>>,
}

impl UpdateQueue {
    pub fn push(&self, update: Update) {
        self.pending.lock().push(update);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Upload everything queued so far, oldest first.
    pub fn flush(&self, backend: &dyn GpuBackend) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock());
        let count = pending.len();
        for update in pending {
            match update {
                Update::Buffer { buffer, data } => backend.write_buffer(&buffer, &data),
                Update::Texture {
                    texture,
                    desc,
                    layers,
                } => {
                    let slices: Vec<&[u8]> = layers.iter().map(Vec::as_slice).collect();
                    backend.write_texture(&texture, &desc, &slices);
                }
            }
        }
        if count > 0 {
            log::trace!("UpdateQueue: flushed {count} deferred uploads");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullBackend;
    use crate::types::{BufferDesc, BufferType, Usage};

    #[test]
    fn test_flush_applies_in_order() {
        let backend = NullBackend::new();
        let desc = BufferDesc::new(BufferType::Constant, Usage::DYNAMIC, 1, 4);
        let buffer = Arc::new(backend.create_buffer(&desc, None).unwrap());

        let queue = UpdateQueue::default();
        queue.push(Update::Buffer {
            buffer: Arc::clone(&buffer),
            data: vec![1, 1, 1, 1],
        });
        queue.push(Update::Buffer {
            buffer: Arc::clone(&buffer),
            data: vec![2, 2, 2, 2],
        });
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.flush(&backend), 2);
        assert_eq!(queue.len(), 0);

        let mut out = [0u8; 4];
        backend.read_buffer(&buffer, &mut out).unwrap();
        assert_eq!(out, [2, 2, 2, 2]);
        assert_eq!(backend.stats().unwrap().uploads, 2);
    }
}

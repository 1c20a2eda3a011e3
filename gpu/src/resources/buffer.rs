//! GPU buffer resource.

use std::sync::Arc;

use crate::backend::GpuBuffer;
use crate::deferred::Update;
use crate::device::Device;
use crate::error::GpuError;
use crate::state::SlotKey;
use crate::types::{Bind, BufferDesc, BufferSlot, BufferType, RegisterType, Usage};

/// A GPU buffer resource.
///
/// Buffers are created by [`Device::create_buffer`] and are reference-counted.
/// They keep their parent device alive.
///
/// # Example
///
/// ```ignore
/// let constants = device.create_buffer(None, 1, 64, BufferType::Constant, Usage::DYNAMIC)?;
/// constants.set_contents(bytemuck::bytes_of(&transforms));
/// constants.bind(Bind::new(0, StageBits::VERTEX, RegisterType::Constant));
/// ```
pub struct Buffer {
    device: Arc<Device>,
    id: u64,
    desc: BufferDesc,
    gpu: Arc<GpuBuffer>,
}

impl Buffer {
    /// Create a new buffer (called by Device).
    pub(crate) fn new(device: Arc<Device>, id: u64, desc: BufferDesc, gpu: GpuBuffer) -> Self {
        Self {
            device,
            id,
            desc,
            gpu: Arc::new(gpu),
        }
    }

    /// Unique id, never reused within a device.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn ty(&self) -> BufferType {
        self.desc.ty
    }

    pub fn usage(&self) -> Usage {
        self.desc.usage
    }

    /// Number of elements.
    pub fn count(&self) -> u32 {
        self.desc.count
    }

    /// Size of one element in bytes.
    pub fn stride(&self) -> u32 {
        self.desc.stride
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.desc.size()
    }

    pub(crate) fn gpu(&self) -> &GpuBuffer {
        &self.gpu
    }

    /// Replace the whole contents of a dynamic buffer.
    ///
    /// Previous contents are discarded. Called off the device's thread, the
    /// upload is queued until the next [`Device::draw_begin`].
    pub fn set_contents(&self, data: &[u8]) {
        if !self.desc.usage.is_dynamic() {
            report_warn!("Attempting to dynamically set contents of a static buffer!");
            return;
        }
        if data.len() as u64 != self.size() {
            report_critical!(
                "Buffer set_contents got {} bytes for a {} byte buffer",
                data.len(),
                self.size()
            );
            return;
        }

        if self.device.on_owner_thread() {
            self.device.backend().write_buffer(&self.gpu, data);
        } else {
            log::trace!("Buffer {}: queueing upload from another thread", self.id);
            self.device.queue_update(Update::Buffer {
                buffer: Arc::clone(&self.gpu),
                data: data.to_vec(),
            });
        }
    }

    /// Bind to the slot described by `bind`.
    ///
    /// A [`RegisterType::Default`] register is resolved from the buffer type.
    /// Binding to a slot kind the buffer can't serve is logged and ignored.
    pub fn bind(&self, bind: Bind) {
        let register = match bind.register_type {
            RegisterType::Default => match self.desc.ty {
                BufferType::Vertex => RegisterType::Vertex,
                BufferType::Index => RegisterType::Index,
                BufferType::Constant => RegisterType::Constant,
                BufferType::Compute => RegisterType::Resource,
            },
            register => register,
        };

        let slot = match (register, self.desc.ty) {
            (RegisterType::Vertex, BufferType::Vertex) => BufferSlot::Vertex {
                slot: bind.slot,
                stride: self.desc.stride,
            },
            (RegisterType::Index, BufferType::Index) => BufferSlot::Index,
            (RegisterType::Constant, BufferType::Constant) => BufferSlot::Constant {
                slot: bind.slot,
                stages: bind.stage_bits,
            },
            (RegisterType::Resource, BufferType::Compute) => BufferSlot::Resource {
                slot: bind.slot,
                stages: bind.stage_bits,
            },
            (RegisterType::ReadWrite, BufferType::Compute)
                if self.desc.usage.contains(Usage::COMPUTE_WRITE) =>
            {
                BufferSlot::ReadWrite {
                    slot: bind.slot,
                    stages: bind.stage_bits,
                }
            }
            (register, ty) => {
                report_critical!(
                    "Can't bind a {ty:?} buffer ({:?}) to a {register:?} slot",
                    self.desc.usage
                );
                return;
            }
        };

        let key = SlotKey {
            register,
            slot: if register == RegisterType::Index { 0 } else { bind.slot },
        };
        self.device.bind_buffer(self.id, &self.gpu, key, slot);
    }

    /// Blocking readback of the buffer into `out`.
    ///
    /// # Errors
    ///
    /// Dynamic buffers are write-only and return [`GpuError::Unsupported`].
    /// `out` must be exactly [`size`](Self::size) bytes.
    pub fn get_contents(&self, out: &mut [u8]) -> Result<(), GpuError> {
        if self.desc.usage.is_dynamic() {
            report_warn!("Dynamic buffers are write-only and can't be read back");
            return Err(GpuError::Unsupported("readback of a dynamic buffer".to_string()));
        }
        if out.len() as u64 != self.size() {
            let err = GpuError::Misuse(format!(
                "readback buffer is {} bytes, buffer is {}",
                out.len(),
                self.size()
            ));
            report_critical!("{err}");
            return Err(err);
        }
        self.device
            .backend()
            .read_buffer(&self.gpu, out)
            .inspect_err(|e| report_critical!("Buffer readback failed: {e}"))
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        log::trace!("Buffer {}: destroyed", self.id);
        self.device.forget(self.id);
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("ty", &self.desc.ty)
            .field("usage", &self.desc.usage)
            .field("size", &self.size())
            .finish()
    }
}

// Ensure Buffer is Send + Sync
static_assertions::assert_impl_all!(Buffer: Send, Sync);

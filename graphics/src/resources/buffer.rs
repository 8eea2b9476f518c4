//! GPU buffer resource.

use crate::backend::GpuBuffer;
use crate::resources::ResourceId;
use crate::types::BufferDescriptor;

/// A GPU buffer resource.
///
/// Buffers are created by [`GraphicsDevice::create_buffer`] and are reference-counted.
///
/// # Example
///
/// ```ignore
/// let buffer = device.create_buffer(
///     &BufferDescriptor::structured(count, 16, BufferUsage::STORAGE),
///     ResourceState::UnorderedAccess,
/// )?;
/// println!("Buffer size: {}", buffer.size());
/// ```
///
/// [`GraphicsDevice::create_buffer`]: crate::GraphicsDevice::create_buffer
pub struct Buffer {
    id: ResourceId,
    descriptor: BufferDescriptor,
    gpu: GpuBuffer,
}

impl Buffer {
    /// Create a new buffer (called by GraphicsDevice).
    pub(crate) fn new(descriptor: BufferDescriptor, gpu: GpuBuffer) -> Self {
        Self {
            id: ResourceId::next(),
            descriptor,
            gpu,
        }
    }

    /// Unique identifier.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Backend handle.
    pub(crate) fn gpu(&self) -> &GpuBuffer {
        &self.gpu
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id.raw())
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

//! Buffer types and descriptors.

use bitflags::bitflags;

use crate::error::GraphicsError;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 0;
        /// Buffer can be read or written as a structured buffer.
        const STORAGE = 1 << 1;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 2;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 3;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Element stride for structured buffers, zero for raw buffers.
    pub stride: u32,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            stride: 0,
            usage,
        }
    }

    /// Create a structured buffer holding `count` elements of `stride` bytes.
    pub fn structured(count: u32, stride: u32, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size: u64::from(count) * u64::from(stride),
            stride,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Number of structured elements, zero for raw buffers.
    pub fn element_count(&self) -> u64 {
        if self.stride == 0 {
            0
        } else {
            self.size / u64::from(self.stride)
        }
    }

    /// Check the descriptor for a zero size.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        if self.size == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {:?} has zero size",
                self.label
            )));
        }
        // wgpu requires copy sizes aligned to four bytes
        if self.size % 4 != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {:?} size {} is not a multiple of 4",
                self.label, self.size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_buffer() {
        let desc = BufferDescriptor::structured(10, 144, BufferUsage::STORAGE).with_label("coeffs");
        assert_eq!(desc.size, 1440);
        assert_eq!(desc.element_count(), 10);
        assert_eq!(desc.label.as_deref(), Some("coeffs"));
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_sizes() {
        assert!(BufferDescriptor::new(0, BufferUsage::STORAGE).validate().is_err());
        assert!(BufferDescriptor::new(6, BufferUsage::STORAGE).validate().is_err());
    }
}

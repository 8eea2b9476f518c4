//! Descriptor heaps, descriptors and their allocators.
//!
//! A [`DescriptorHeap`] is a fixed-capacity table of [`ResourceView`]s. Shaders
//! reach views through descriptor tables bound with a [`GpuDescriptorHandle`];
//! the handle is resolved back to a view when the command list executes, so a
//! slot must stay untouched until the GPU work that reads it has completed.
//!
//! Slots are handed out by a [`DescriptorAllocator`]. Groups of descriptors
//! with a shared lifetime are held by [`OwnedDescriptors`] (released together
//! on drop) or by a [`DescriptorArena`] (bump allocated, reset in bulk).

mod allocator;
mod arena;

pub use allocator::{DescriptorAllocator, SharedDescriptorAllocator};
pub use arena::{DescriptorArena, OwnedDescriptors};

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::error::GraphicsError;
use crate::resources::{Buffer, Resource, Texture};
use crate::types::{BufferViewDesc, TextureSrvDesc, TextureUavDesc};

/// Distance in bytes between two consecutive handles of a heap.
pub const DESCRIPTOR_INCREMENT: u64 = 32;

const GPU_HANDLE_BIT: u64 = 1 << 63;

static NEXT_HEAP_ID: AtomicU32 = AtomicU32::new(1);

/// CPU-visible address of a descriptor slot, used when writing views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CpuDescriptorHandle(pub u64);

/// GPU-visible address of a descriptor slot, used when binding tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GpuDescriptorHandle(pub u64);

/// One allocated slot of a descriptor heap.
///
/// A descriptor is owned by the allocator that issued it and must be freed
/// back to that allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Descriptor {
    /// CPU handle of the slot.
    pub cpu_handle: CpuDescriptorHandle,
    /// GPU handle of the slot.
    pub gpu_handle: GpuDescriptorHandle,
    /// Slot index within the heap.
    pub index: u32,
}

impl Descriptor {
    /// Sentinel index of an unallocated descriptor.
    pub const INVALID_INDEX: u32 = u32::MAX;

    /// An unallocated descriptor.
    pub const INVALID: Self = Self {
        cpu_handle: CpuDescriptorHandle(0),
        gpu_handle: GpuDescriptorHandle(0),
        index: Self::INVALID_INDEX,
    };

    /// Returns true if the descriptor refers to an allocated slot.
    pub fn is_valid(&self) -> bool {
        self.index != Self::INVALID_INDEX
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Self::INVALID
    }
}

/// A view stored in a descriptor heap slot.
#[derive(Debug, Clone)]
pub enum ResourceView {
    /// Read-only view of a texture.
    TextureSrv {
        /// Viewed texture.
        texture: Arc<Texture>,
        /// View description.
        desc: TextureSrvDesc,
    },
    /// Read-write view of one mip of a texture array range.
    TextureUav {
        /// Viewed texture.
        texture: Arc<Texture>,
        /// View description.
        desc: TextureUavDesc,
    },
    /// Read-only view of a structured buffer.
    BufferSrv {
        /// Viewed buffer.
        buffer: Arc<Buffer>,
        /// View description.
        desc: BufferViewDesc,
    },
    /// Read-write view of a structured buffer.
    BufferUav {
        /// Viewed buffer.
        buffer: Arc<Buffer>,
        /// View description.
        desc: BufferViewDesc,
    },
}

impl ResourceView {
    /// The resource behind the view.
    pub fn resource(&self) -> Resource {
        match self {
            Self::TextureSrv { texture, .. } | Self::TextureUav { texture, .. } => {
                Resource::Texture(Arc::clone(texture))
            }
            Self::BufferSrv { buffer, .. } | Self::BufferUav { buffer, .. } => {
                Resource::Buffer(Arc::clone(buffer))
            }
        }
    }

    /// Returns true for unordered access views.
    pub fn is_uav(&self) -> bool {
        matches!(self, Self::TextureUav { .. } | Self::BufferUav { .. })
    }

    /// Check the view against its resource.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        match self {
            Self::TextureSrv { texture, desc } => desc.validate(texture.descriptor()),
            Self::TextureUav { texture, desc } => desc.validate(texture.descriptor()),
            Self::BufferSrv { buffer, desc } | Self::BufferUav { buffer, desc } => {
                desc.validate(buffer.descriptor())
            }
        }
    }
}

/// A fixed-capacity table of resource views.
pub struct DescriptorHeap {
    id: u32,
    label: Option<String>,
    slots: RwLock<Vec<Option<ResourceView>>>,
}

impl std::fmt::Debug for DescriptorHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorHeap")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl DescriptorHeap {
    /// Create a heap with `capacity` empty slots.
    pub fn new(capacity: u32, label: Option<String>) -> Result<Self, GraphicsError> {
        if capacity == 0 {
            return Err(GraphicsError::InvalidParameter(
                "descriptor heap capacity must be non-zero".into(),
            ));
        }
        let id = NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed);
        log::trace!("DescriptorHeap {id}: created with {capacity} slots ({label:?})");
        Ok(Self {
            id,
            label,
            slots: RwLock::new(vec![None; capacity as usize]),
        })
    }

    /// Number of slots.
    pub fn capacity(&self) -> u32 {
        self.slots.read().len() as u32
    }

    /// Debug label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn base(&self) -> u64 {
        u64::from(self.id) << 32
    }

    /// CPU handle of the slot at `index`.
    pub fn cpu_handle(&self, index: u32) -> CpuDescriptorHandle {
        CpuDescriptorHandle(self.base() + u64::from(index) * DESCRIPTOR_INCREMENT)
    }

    /// GPU handle of the slot at `index`.
    pub fn gpu_handle(&self, index: u32) -> GpuDescriptorHandle {
        GpuDescriptorHandle(GPU_HANDLE_BIT | (self.base() + u64::from(index) * DESCRIPTOR_INCREMENT))
    }

    /// Build the descriptor for the slot at `index`.
    pub(crate) fn descriptor(&self, index: u32) -> Descriptor {
        Descriptor {
            cpu_handle: self.cpu_handle(index),
            gpu_handle: self.gpu_handle(index),
            index,
        }
    }

    /// Slot index addressed by a GPU handle of this heap.
    pub fn index_of(&self, handle: GpuDescriptorHandle) -> Option<u32> {
        let raw = handle.0;
        if raw & GPU_HANDLE_BIT == 0 {
            return None;
        }
        let offset = (raw & !GPU_HANDLE_BIT).checked_sub(self.base())?;
        if offset % DESCRIPTOR_INCREMENT != 0 {
            return None;
        }
        let index = u32::try_from(offset / DESCRIPTOR_INCREMENT).ok()?;
        (index < self.capacity()).then_some(index)
    }

    /// Validate `view` and store it in the slot of `descriptor`.
    pub fn write_view(&self, descriptor: &Descriptor, view: ResourceView) -> Result<(), GraphicsError> {
        if !descriptor.is_valid() || descriptor.cpu_handle != self.cpu_handle(descriptor.index) {
            return Err(GraphicsError::InvalidParameter(format!(
                "descriptor {} does not belong to heap {}",
                descriptor.index, self.id
            )));
        }
        view.validate()?;
        let mut slots = self.slots.write();
        let slot = slots.get_mut(descriptor.index as usize).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!(
                "descriptor {} out of range for heap {}",
                descriptor.index, self.id
            ))
        })?;
        log::trace!("DescriptorHeap {}: slot {} <- {view:?}", self.id, descriptor.index);
        *slot = Some(view);
        Ok(())
    }

    /// Empty the slot at `index`.
    pub(crate) fn clear(&self, index: u32) {
        if let Some(slot) = self.slots.write().get_mut(index as usize) {
            *slot = None;
        }
    }

    /// View stored at `index`, if any.
    pub fn view(&self, index: u32) -> Option<ResourceView> {
        self.slots.read().get(index as usize).cloned().flatten()
    }

    /// Resolve a GPU handle into the view it addresses.
    pub fn resolve(&self, handle: GpuDescriptorHandle) -> Result<ResourceView, GraphicsError> {
        let index = self.index_of(handle).ok_or_else(|| {
            GraphicsError::ExecutionFailed(format!(
                "GPU handle {:#x} is not part of heap {}",
                handle.0, self.id
            ))
        })?;
        self.view(index).ok_or_else(|| {
            GraphicsError::ExecutionFailed(format!("slot {index} of heap {} holds no view", self.id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_round_trip() {
        let heap = DescriptorHeap::new(16, None).unwrap();
        let descriptor = heap.descriptor(7);
        assert_eq!(descriptor.index, 7);
        assert_eq!(heap.index_of(descriptor.gpu_handle), Some(7));
        assert_eq!(
            descriptor.cpu_handle.0 - heap.cpu_handle(0).0,
            7 * DESCRIPTOR_INCREMENT
        );
    }

    #[test]
    fn test_foreign_handles_rejected() {
        let heap_a = DescriptorHeap::new(4, None).unwrap();
        let heap_b = DescriptorHeap::new(4, None).unwrap();
        assert_eq!(heap_a.index_of(heap_b.gpu_handle(1)), None);
        assert_eq!(heap_a.index_of(GpuDescriptorHandle(heap_a.cpu_handle(1).0)), None);
        assert_eq!(heap_a.index_of(heap_a.gpu_handle(4)), None);
    }

    #[test]
    fn test_resolve_empty_slot_fails() {
        let heap = DescriptorHeap::new(4, None).unwrap();
        assert!(matches!(
            heap.resolve(heap.gpu_handle(0)),
            Err(GraphicsError::ExecutionFailed(_))
        ));
    }

    #[test]
    fn test_invalid_descriptor() {
        assert!(!Descriptor::INVALID.is_valid());
        assert!(!Descriptor::default().is_valid());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(DescriptorHeap::new(0, None).is_err());
    }
}

//! Bump allocator with an ordered free set over a descriptor heap.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Descriptor, DescriptorHeap};
use crate::error::AllocError;

/// A descriptor allocator shared between the owners of descriptors.
///
/// The allocator itself does no locking; the mutex serializes callers and is
/// only held for a single allocate or free.
pub type SharedDescriptorAllocator = Arc<Mutex<DescriptorAllocator>>;

/// Hands out slots of a [`DescriptorHeap`].
///
/// Slots are bump allocated from a tail index. Freed slots below the tail go
/// into an ordered free set and are reused lowest index first, which keeps the
/// live set packed toward the front of the heap. Freeing the slot right below
/// the tail shrinks the tail instead, absorbing any free slots that end up
/// adjacent to it.
///
/// # Example
///
/// ```ignore
/// let mut allocator = DescriptorAllocator::new(heap);
/// let mut descriptor = allocator.allocate()?;
/// heap.write_view(&descriptor, view)?;
/// allocator.free(&mut descriptor);
/// assert!(!descriptor.is_valid());
/// ```
#[derive(Debug)]
pub struct DescriptorAllocator {
    heap: Arc<DescriptorHeap>,
    free_indices: BTreeSet<u32>,
    tail_index: u32,
    current_length: u32,
    total_length: u32,
}

impl DescriptorAllocator {
    /// Create an allocator owning every slot of `heap`.
    pub fn new(heap: Arc<DescriptorHeap>) -> Self {
        let total_length = heap.capacity();
        Self {
            heap,
            free_indices: BTreeSet::new(),
            tail_index: 0,
            current_length: 0,
            total_length,
        }
    }

    /// Wrap the allocator for sharing.
    pub fn into_shared(self) -> SharedDescriptorAllocator {
        Arc::new(Mutex::new(self))
    }

    /// The heap the descriptors live in.
    pub fn heap(&self) -> &Arc<DescriptorHeap> {
        &self.heap
    }

    /// Capacity of the heap.
    pub fn total_length(&self) -> u32 {
        self.total_length
    }

    /// Number of live descriptors.
    pub fn current_length(&self) -> u32 {
        self.current_length
    }

    /// One past the highest slot handed out by bump allocation.
    pub fn tail_index(&self) -> u32 {
        self.tail_index
    }

    /// Number of released slots waiting for reuse.
    pub fn free_count(&self) -> usize {
        self.free_indices.len()
    }

    /// Allocate a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::HeapExhausted`] when every slot is live.
    pub fn allocate(&mut self) -> Result<Descriptor, AllocError> {
        let index = if let Some(index) = self.free_indices.pop_first() {
            index
        } else if self.tail_index < self.total_length {
            self.tail_index += 1;
            self.tail_index - 1
        } else {
            log::error!(
                "DescriptorAllocator: heap {:?} exhausted ({} slots)",
                self.heap.label(),
                self.total_length
            );
            return Err(AllocError::HeapExhausted {
                capacity: self.total_length,
            });
        };

        self.current_length += 1;
        debug_assert!(self.current_length <= self.total_length);
        log::trace!("DescriptorAllocator: allocated slot {index}");
        Ok(self.heap.descriptor(index))
    }

    fn is_live(&self, index: u32) -> bool {
        index < self.tail_index && !self.free_indices.contains(&index)
    }

    /// Release a descriptor and invalidate the caller's copy.
    ///
    /// Descriptors that are out of range or already free are ignored.
    pub fn free(&mut self, descriptor: &mut Descriptor) {
        let index = descriptor.index;
        if index >= self.total_length {
            if descriptor.is_valid() {
                log::warn!("DescriptorAllocator: free of out-of-range slot {index}");
            }
            *descriptor = Descriptor::INVALID;
            return;
        }
        if !self.is_live(index) {
            log::warn!("DescriptorAllocator: slot {index} is already free");
            *descriptor = Descriptor::INVALID;
            return;
        }

        self.heap.clear(index);
        self.current_length -= 1;
        if index + 1 == self.tail_index {
            self.tail_index = index;
            while self.tail_index > 0 && self.free_indices.remove(&(self.tail_index - 1)) {
                self.tail_index -= 1;
            }
        } else {
            self.free_indices.insert(index);
        }
        log::trace!(
            "DescriptorAllocator: freed slot {index} (tail {}, free {})",
            self.tail_index,
            self.free_indices.len()
        );
        *descriptor = Descriptor::INVALID;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(capacity: u32) -> DescriptorAllocator {
        DescriptorAllocator::new(Arc::new(DescriptorHeap::new(capacity, None).unwrap()))
    }

    #[test]
    fn test_bump_allocation() {
        let mut alloc = allocator(8);
        for expected in 0..4 {
            assert_eq!(alloc.allocate().unwrap().index, expected);
        }
        assert_eq!(alloc.current_length(), 4);
        assert_eq!(alloc.tail_index(), 4);
    }

    #[test]
    fn test_allocate_free_round_trip() {
        let mut alloc = allocator(8);
        let _a = alloc.allocate().unwrap();
        let mut b = alloc.allocate().unwrap();
        let index = b.index;
        alloc.free(&mut b);
        assert!(!b.is_valid());
        assert_eq!(alloc.allocate().unwrap().index, index);
    }

    #[test]
    fn test_lowest_index_reused_first() {
        let mut alloc = allocator(8);
        let mut descriptors: Vec<_> = (0..6).map(|_| alloc.allocate().unwrap()).collect();
        alloc.free(&mut descriptors[3]);
        alloc.free(&mut descriptors[1]);
        alloc.free(&mut descriptors[4]);
        assert_eq!(alloc.free_count(), 3);

        assert_eq!(alloc.allocate().unwrap().index, 1);
        assert_eq!(alloc.allocate().unwrap().index, 3);
        assert_eq!(alloc.allocate().unwrap().index, 4);
        assert_eq!(alloc.allocate().unwrap().index, 6);
    }

    #[test]
    fn test_exhaustion() {
        let mut alloc = allocator(4);
        for _ in 0..4 {
            alloc.allocate().unwrap();
        }
        assert_eq!(
            alloc.allocate(),
            Err(AllocError::HeapExhausted { capacity: 4 })
        );
        assert_eq!(alloc.current_length(), 4);
    }

    #[test]
    fn test_freeing_everything_resets_tail() {
        let mut alloc = allocator(8);
        let mut descriptors: Vec<_> = (0..5).map(|_| alloc.allocate().unwrap()).collect();
        for descriptor in descriptors.iter_mut() {
            alloc.free(descriptor);
        }
        assert_eq!(alloc.current_length(), 0);
        assert_eq!(alloc.tail_index(), 0);
        assert_eq!(alloc.free_count(), 0);
        assert_eq!(alloc.allocate().unwrap().index, 0);
    }

    #[test]
    fn test_tail_absorbs_adjacent_free_slots() {
        let mut alloc = allocator(8);
        let mut descriptors: Vec<_> = (0..4).map(|_| alloc.allocate().unwrap()).collect();
        alloc.free(&mut descriptors[2]);
        alloc.free(&mut descriptors[1]);
        alloc.free(&mut descriptors[3]);
        assert_eq!(alloc.tail_index(), 1);
        assert_eq!(alloc.free_count(), 0);
    }

    #[test]
    fn test_double_free_is_ignored() {
        let mut alloc = allocator(4);
        let _keep = alloc.allocate().unwrap();
        let mut descriptor = alloc.allocate().unwrap();
        let mut copy = descriptor;
        alloc.free(&mut descriptor);
        alloc.free(&mut copy);
        assert_eq!(alloc.current_length(), 1);

        let mut invalid = Descriptor::INVALID;
        alloc.free(&mut invalid);
        assert_eq!(alloc.current_length(), 1);
    }
}

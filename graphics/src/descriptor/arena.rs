//! Descriptor groups with a shared lifetime.

use super::{Descriptor, SharedDescriptorAllocator};
use crate::error::AllocError;

/// A set of descriptors released together when the set is dropped.
///
/// Construction code allocates every descriptor through one of these so that
/// an early return gives every slot acquired so far back to the allocator.
#[derive(Debug)]
pub struct OwnedDescriptors {
    allocator: SharedDescriptorAllocator,
    descriptors: Vec<Descriptor>,
}

impl OwnedDescriptors {
    /// Create an empty set drawing from `allocator`.
    pub fn new(allocator: SharedDescriptorAllocator) -> Self {
        Self {
            allocator,
            descriptors: Vec::new(),
        }
    }

    /// Allocate a descriptor owned by this set.
    pub fn allocate(&mut self) -> Result<Descriptor, AllocError> {
        let descriptor = self.allocator.lock().allocate()?;
        self.descriptors.push(descriptor);
        Ok(descriptor)
    }

    /// Number of descriptors held.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true if no descriptor is held.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// The allocator the descriptors came from.
    pub fn allocator(&self) -> &SharedDescriptorAllocator {
        &self.allocator
    }

    fn get(&self, index: usize) -> Option<&Descriptor> {
        self.descriptors.get(index)
    }
}

impl Drop for OwnedDescriptors {
    fn drop(&mut self) {
        if self.descriptors.is_empty() {
            return;
        }
        let mut allocator = self.allocator.lock();
        for descriptor in self.descriptors.iter_mut() {
            allocator.free(descriptor);
        }
        log::trace!(
            "OwnedDescriptors: released {} descriptors",
            self.descriptors.len()
        );
    }
}

/// A block of scratch descriptors handed out by bump allocation.
///
/// The block is reserved up front. [`reset`](Self::reset) makes every slot
/// available again; callers reset only once the GPU has finished with the
/// views written during the previous round. The block returns to the
/// allocator when the arena is dropped.
#[derive(Debug)]
pub struct DescriptorArena {
    block: OwnedDescriptors,
    cursor: usize,
}

impl DescriptorArena {
    /// Reserve `capacity` descriptors from `allocator`.
    ///
    /// # Errors
    ///
    /// Fails if the heap cannot supply every slot; nothing stays reserved then.
    pub fn new(allocator: SharedDescriptorAllocator, capacity: u32) -> Result<Self, AllocError> {
        let mut block = OwnedDescriptors::new(allocator);
        for _ in 0..capacity {
            block.allocate()?;
        }
        Ok(Self { block, cursor: 0 })
    }

    /// Take the next scratch descriptor.
    pub fn allocate(&mut self) -> Result<Descriptor, AllocError> {
        let descriptor = self
            .block
            .get(self.cursor)
            .copied()
            .ok_or(AllocError::ArenaExhausted {
                capacity: self.capacity(),
            })?;
        self.cursor += 1;
        Ok(descriptor)
    }

    /// Make every scratch descriptor available again.
    pub fn reset(&mut self) {
        let allocator = self.block.allocator().lock();
        let heap = allocator.heap();
        for descriptor in &self.block.descriptors[..self.cursor] {
            heap.clear(descriptor.index);
        }
        drop(allocator);
        log::trace!("DescriptorArena: reset after {} allocations", self.cursor);
        self.cursor = 0;
    }

    /// Number of reserved descriptors.
    pub fn capacity(&self) -> u32 {
        self.block.len() as u32
    }

    /// Number of descriptors handed out since the last reset.
    pub fn used(&self) -> u32 {
        self.cursor as u32
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::descriptor::{DescriptorAllocator, DescriptorHeap};

    fn shared(capacity: u32) -> SharedDescriptorAllocator {
        DescriptorAllocator::new(Arc::new(DescriptorHeap::new(capacity, None).unwrap())).into_shared()
    }

    #[test]
    fn test_owned_descriptors_release_on_drop() {
        let allocator = shared(8);
        {
            let mut owned = OwnedDescriptors::new(Arc::clone(&allocator));
            for _ in 0..5 {
                owned.allocate().unwrap();
            }
            assert_eq!(allocator.lock().current_length(), 5);
        }
        assert_eq!(allocator.lock().current_length(), 0);
        assert_eq!(allocator.lock().tail_index(), 0);
    }

    #[test]
    fn test_arena_bump_and_reset() {
        let allocator = shared(8);
        let mut arena = DescriptorArena::new(Arc::clone(&allocator), 3).unwrap();
        assert_eq!(allocator.lock().current_length(), 3);

        let first = arena.allocate().unwrap();
        arena.allocate().unwrap();
        arena.allocate().unwrap();
        assert_eq!(
            arena.allocate(),
            Err(AllocError::ArenaExhausted { capacity: 3 })
        );
        assert_eq!(arena.used(), 3);

        arena.reset();
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.allocate().unwrap(), first);
        assert_eq!(allocator.lock().current_length(), 3);

        drop(arena);
        assert_eq!(allocator.lock().current_length(), 0);
    }

    #[test]
    fn test_arena_reservation_failure_rolls_back() {
        let allocator = shared(4);
        let _held = allocator.lock().allocate().unwrap();
        assert!(DescriptorArena::new(Arc::clone(&allocator), 4).is_err());
        assert_eq!(allocator.lock().current_length(), 1);
    }
}

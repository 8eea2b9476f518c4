//! Command recording and submission.
//!
//! A [`CommandList`] records [`Command`]s in order. Recording is purely CPU
//! side: handles are checked when the list executes, at which point descriptor
//! tables are resolved to the views their heap slots hold.
//!
//! ```text
//!  CommandContext::reset ──▶ record ──▶ CommandContext::submit
//!                                        ├─ CommandList::close
//!                                        └─ CommandQueue::execute ──▶ backend
//! ```
//!
//! A list starts closed. Recording into a closed list does not panic: the list
//! is poisoned and the error is reported by [`CommandList::close`] or by the
//! queue.

mod context;
mod queue;
pub(crate) mod replay;

pub use context::CommandContext;
pub use queue::CommandQueue;

use std::sync::Arc;

use bytemuck::Pod;

use crate::descriptor::{DescriptorHeap, GpuDescriptorHandle};
use crate::error::GraphicsError;
use crate::pipeline::ComputePipeline;
use crate::resources::Resource;
use crate::types::ResourceState;

/// A resource barrier.
#[derive(Debug, Clone)]
pub enum ResourceBarrier {
    /// Move every subresource of `resource` from `before` to `after`.
    Transition {
        /// Resource to transition.
        resource: Resource,
        /// State the resource is in.
        before: ResourceState,
        /// State the resource moves to.
        after: ResourceState,
    },
    /// Make prior unordered-access writes visible to later accesses.
    Uav {
        /// Resource written through a UAV.
        resource: Resource,
    },
}

impl ResourceBarrier {
    /// A transition barrier.
    pub fn transition(resource: impl Into<Resource>, before: ResourceState, after: ResourceState) -> Self {
        Self::Transition {
            resource: resource.into(),
            before,
            after,
        }
    }

    /// A UAV barrier.
    pub fn uav(resource: impl Into<Resource>) -> Self {
        Self::Uav {
            resource: resource.into(),
        }
    }

    /// The resource the barrier applies to.
    pub fn resource(&self) -> &Resource {
        match self {
            Self::Transition { resource, .. } | Self::Uav { resource } => resource,
        }
    }
}

/// A recorded command.
#[derive(Debug, Clone)]
pub enum Command {
    /// Bind the heap descriptor tables are resolved against.
    SetDescriptorHeap(Arc<DescriptorHeap>),
    /// Bind a compute pipeline.
    SetPipeline(Arc<ComputePipeline>),
    /// Set the root constants of parameter `parameter`.
    SetRootConstants {
        /// Root parameter index.
        parameter: u32,
        /// 32-bit values.
        values: Vec<u32>,
    },
    /// Bind a descriptor table.
    SetDescriptorTable {
        /// Root parameter index.
        parameter: u32,
        /// First descriptor of the table.
        handle: GpuDescriptorHandle,
    },
    /// Dispatch thread groups.
    Dispatch {
        /// Groups along X.
        x: u32,
        /// Groups along Y.
        y: u32,
        /// Groups along Z.
        z: u32,
    },
    /// Resource barriers.
    Barrier(Vec<ResourceBarrier>),
}

/// A list of recorded compute commands.
///
/// # Example
///
/// ```ignore
/// let mut list = CommandList::new(Some("bake"));
/// list.reset();
/// list.set_descriptor_heap(&heap);
/// list.set_compute_pipeline(&pipeline);
/// list.set_compute_root_constants(0, &constants);
/// list.set_compute_root_descriptor_table(1, srv.gpu_handle);
/// list.dispatch(4, 4, 1);
/// list.close()?;
/// queue.execute(&list)?;
/// ```
#[derive(Debug, Default)]
pub struct CommandList {
    label: Option<String>,
    commands: Vec<Command>,
    recording: bool,
    poisoned: Option<String>,
}

impl CommandList {
    /// Create a closed, empty command list.
    pub fn new(label: Option<&str>) -> Self {
        Self {
            label: label.map(str::to_owned),
            ..Self::default()
        }
    }

    /// Debug label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Discard recorded commands and open the list for recording.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.poisoned = None;
        self.recording = true;
    }

    /// Returns true between [`reset`](Self::reset) and [`close`](Self::close).
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Finish recording.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the list was not open or
    /// if a command was recorded while it was closed.
    pub fn close(&mut self) -> Result<(), GraphicsError> {
        if let Some(reason) = &self.poisoned {
            return Err(GraphicsError::InvalidParameter(format!(
                "command list {:?}: {reason}",
                self.label
            )));
        }
        if !self.recording {
            return Err(GraphicsError::InvalidParameter(format!(
                "command list {:?} closed while not recording",
                self.label
            )));
        }
        self.recording = false;
        log::trace!("CommandList {:?}: closed with {} commands", self.label, self.commands.len());
        Ok(())
    }

    /// Recorded commands.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub(crate) fn poison_reason(&self) -> Option<&str> {
        self.poisoned.as_deref()
    }

    fn record(&mut self, command: Command) {
        if !self.recording {
            if self.poisoned.is_none() {
                log::warn!("CommandList {:?}: {command:?} recorded while closed", self.label);
                self.poisoned = Some("command recorded while the list was closed".into());
            }
            return;
        }
        self.commands.push(command);
    }

    /// Bind the descriptor heap.
    pub fn set_descriptor_heap(&mut self, heap: &Arc<DescriptorHeap>) {
        self.record(Command::SetDescriptorHeap(Arc::clone(heap)));
    }

    /// Bind a compute pipeline.
    pub fn set_compute_pipeline(&mut self, pipeline: &Arc<ComputePipeline>) {
        self.record(Command::SetPipeline(Arc::clone(pipeline)));
    }

    /// Set root constants from a plain-old-data block.
    ///
    /// The block size must be a multiple of four bytes.
    pub fn set_compute_root_constants<T: Pod>(&mut self, parameter: u32, constants: &T) {
        let bytes = bytemuck::bytes_of(constants);
        if bytes.len() % 4 != 0 {
            self.poisoned.get_or_insert_with(|| {
                format!("root constants of {} bytes are not 32-bit values", bytes.len())
            });
            return;
        }
        let values = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        self.set_compute_root_32bit_constants(parameter, values);
    }

    /// Set root constants from raw 32-bit values.
    pub fn set_compute_root_32bit_constants(&mut self, parameter: u32, values: Vec<u32>) {
        self.record(Command::SetRootConstants { parameter, values });
    }

    /// Bind a descriptor table to root parameter `parameter`.
    pub fn set_compute_root_descriptor_table(&mut self, parameter: u32, handle: GpuDescriptorHandle) {
        self.record(Command::SetDescriptorTable { parameter, handle });
    }

    /// Dispatch `x * y * z` thread groups.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.record(Command::Dispatch { x, y, z });
    }

    /// Record resource barriers.
    pub fn resource_barrier(&mut self, barriers: Vec<ResourceBarrier>) {
        if barriers.is_empty() {
            return;
        }
        self.record(Command::Barrier(barriers));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_list_is_closed() {
        let list = CommandList::new(Some("test"));
        assert!(!list.is_recording());
        assert!(list.is_empty());
        assert_eq!(list.label(), Some("test"));
    }

    #[test]
    fn test_reset_record_close() {
        let mut list = CommandList::new(None);
        list.reset();
        list.dispatch(1, 2, 3);
        assert_eq!(list.len(), 1);
        assert!(list.close().is_ok());
        assert!(!list.is_recording());
        assert!(matches!(list.commands()[0], Command::Dispatch { x: 1, y: 2, z: 3 }));
    }

    #[test]
    fn test_recording_while_closed_poisons() {
        let mut list = CommandList::new(None);
        list.dispatch(1, 1, 1);
        assert!(list.is_empty());
        list.resource_barrier(Vec::new());
        assert!(matches!(list.close(), Err(GraphicsError::InvalidParameter(_))));

        list.reset();
        assert!(list.poison_reason().is_none());
        assert!(list.close().is_ok());
    }

    #[test]
    fn test_double_close_fails() {
        let mut list = CommandList::new(None);
        list.reset();
        assert!(list.close().is_ok());
        assert!(list.close().is_err());
    }

    #[test]
    fn test_root_constants_are_split_into_words() {
        #[repr(C)]
        #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
        struct Block {
            a: u32,
            b: f32,
        }

        let mut list = CommandList::new(None);
        list.reset();
        list.set_compute_root_constants(0, &Block { a: 7, b: 1.0 });
        match &list.commands()[0] {
            Command::SetRootConstants { parameter, values } => {
                assert_eq!(*parameter, 0);
                assert_eq!(values, &vec![7, 1.0f32.to_bits()]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_empty_barrier_list_is_skipped() {
        let mut list = CommandList::new(None);
        list.reset();
        list.resource_barrier(Vec::new());
        assert!(list.is_empty());
    }
}

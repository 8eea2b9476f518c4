//! Command queue.

use std::sync::Arc;

use super::CommandList;
use super::replay::{self, ReplayOp};
use crate::backend::GpuBackend;
use crate::error::GraphicsError;
use crate::scheduler::Fence;

/// Executes closed command lists and signals fences in submission order.
pub struct CommandQueue {
    label: Option<String>,
    backend: Arc<dyn GpuBackend>,
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("label", &self.label)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl CommandQueue {
    pub(crate) fn new(backend: Arc<dyn GpuBackend>, label: Option<&str>) -> Self {
        Self {
            label: label.map(str::to_owned),
            backend,
        }
    }

    /// Debug label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Execute a closed command list.
    ///
    /// # Errors
    ///
    /// Fails if the list is still recording or poisoned, if a handle does not
    /// resolve, or if the backend rejects the work.
    pub fn execute(&self, list: &CommandList) -> Result<(), GraphicsError> {
        if list.is_recording() {
            return Err(GraphicsError::InvalidParameter(format!(
                "command list {:?} executed while still recording",
                list.label()
            )));
        }
        if let Some(reason) = list.poison_reason() {
            return Err(GraphicsError::InvalidParameter(format!(
                "command list {:?}: {reason}",
                list.label()
            )));
        }
        let ops = replay::resolve(list.label(), list.commands())?;
        let dispatches = ops
            .iter()
            .filter(|op| matches!(op, ReplayOp::Dispatch(_)))
            .count();
        log::debug!(
            "CommandQueue {:?}: executing {:?} ({} ops, {dispatches} dispatches) on {}",
            self.label,
            list.label(),
            ops.len(),
            self.backend.name()
        );
        self.backend.execute(&ops)
    }

    /// Set `fence` to `value` once all previously executed work completes.
    pub fn signal(&self, fence: &Fence, value: u64) -> Result<(), GraphicsError> {
        log::trace!("CommandQueue {:?}: signal fence to {value}", self.label);
        self.backend.signal(fence, value)
    }
}

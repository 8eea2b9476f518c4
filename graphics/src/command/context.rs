//! Command context: a command list and its submission.

use super::{CommandList, CommandQueue};
use crate::error::GraphicsError;

/// Owns one command list and submits it to a queue.
///
/// The recording memory belongs to the list, so resetting the context reuses
/// it for the next batch of commands.
///
/// # Example
///
/// ```ignore
/// let mut context = CommandContext::new(Some("bake"));
/// context.reset();
/// probe.load_environment_map(&device, context.list_mut(), &equirect)?;
/// context.submit(&queue)?;
/// ```
#[derive(Debug)]
pub struct CommandContext {
    list: CommandList,
}

impl CommandContext {
    /// Create a context whose list starts closed.
    pub fn new(label: Option<&str>) -> Self {
        Self {
            list: CommandList::new(label),
        }
    }

    /// Begin recording, discarding previously recorded commands.
    ///
    /// The previous submission must have completed on the GPU if the commands
    /// reference transient descriptors.
    pub fn reset(&mut self) {
        self.list.reset();
    }

    /// The command list.
    pub fn list(&self) -> &CommandList {
        &self.list
    }

    /// The command list, for recording.
    pub fn list_mut(&mut self) -> &mut CommandList {
        &mut self.list
    }

    /// Close the list and execute it on `queue`.
    pub fn submit(&mut self, queue: &CommandQueue) -> Result<(), GraphicsError> {
        self.list.close()?;
        queue.execute(&self.list)
    }
}

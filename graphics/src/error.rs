//! Graphics error types.

use std::path::PathBuf;

/// Errors returned by the descriptor allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// Every slot of the descriptor heap is in use.
    #[error("descriptor heap exhausted ({capacity} slots in use)")]
    HeapExhausted {
        /// Capacity of the heap.
        capacity: u32,
    },
    /// A descriptor arena handed out every slot it reserved.
    #[error("descriptor arena exhausted ({capacity} slots reserved)")]
    ArenaExhausted {
        /// Number of slots reserved by the arena.
        capacity: u32,
    },
}

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Failed to create a root signature or pipeline.
    #[error("pipeline creation failed: {0}")]
    PipelineCreationFailed(String),
    /// A shader file could not be read.
    #[error("failed to load shader {path:?}: {reason}")]
    ShaderLoadFailed {
        /// Path that was read.
        path: PathBuf,
        /// Reason reported by the file system.
        reason: String,
    },
    /// Shader source failed to parse or validate.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),
    /// A descriptor could not be allocated.
    #[error(transparent)]
    DescriptorAllocation(#[from] AllocError),
    /// A requested feature is not supported.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A resource was used in a state that does not allow the access.
    #[error("invalid resource state: {0}")]
    InvalidResourceState(String),
    /// A UAV write was not made visible before the next access.
    #[error("unordered access hazard: {0}")]
    Hazard(String),
    /// Executing a command list failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
    /// Waiting on the GPU exceeded the timeout.
    #[error("timed out waiting for fence value {value}")]
    Timeout {
        /// Fence value that was not reached.
        value: u64,
    },
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

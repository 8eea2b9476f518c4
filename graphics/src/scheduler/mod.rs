//! CPU-GPU synchronization.
//!
//! # Module Contents
//!
//! - [`Fence`] - Shared GPU timeline advanced by queue signals
//! - [`Event`] - Single-owner auto-reset event a fence can set
//! - [`GpuSync`] - Fence, event and counters for waiting on submitted work
//!
//! # Example
//!
//! ```ignore
//! let mut sync = device.create_sync();
//! context.submit(&queue)?;
//! sync.signal(&queue)?;
//! sync.wait_timeout(Duration::from_secs(5))?;
//! ```

mod sync;

pub use sync::{Event, Fence, GpuSync};

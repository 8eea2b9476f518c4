//! GPU resources.
//!
//! This module contains the GPU resource types that are created by [`GraphicsDevice`]:
//! - [`Buffer`] - GPU memory buffer
//! - [`Texture`] - GPU texture (2D, 2D array or cube compatible)
//! - [`Texture2D`] - A sampled 2D texture paired with its shader resource view
//!
//! Resources are reference-counted with [`Arc`]. Command lists and descriptor
//! heap slots keep the resources they reference alive.
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice
//! [`Arc`]: std::sync::Arc

mod buffer;
mod texture;
mod texture2d;

pub use buffer::Buffer;
pub use texture::Texture;
pub use texture2d::Texture2D;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a texture or buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identifier value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A texture or buffer referenced by a barrier or view.
#[derive(Debug, Clone)]
pub enum Resource {
    /// A texture.
    Texture(Arc<Texture>),
    /// A buffer.
    Buffer(Arc<Buffer>),
}

impl Resource {
    /// Identifier of the resource.
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Texture(texture) => texture.id(),
            Self::Buffer(buffer) => buffer.id(),
        }
    }

    /// Debug label of the resource.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Texture(texture) => texture.label(),
            Self::Buffer(buffer) => buffer.label(),
        }
    }
}

impl From<&Arc<Texture>> for Resource {
    fn from(texture: &Arc<Texture>) -> Self {
        Self::Texture(Arc::clone(texture))
    }
}

impl From<&Arc<Buffer>> for Resource {
    fn from(buffer: &Arc<Buffer>) -> Self {
        Self::Buffer(Arc::clone(buffer))
    }
}

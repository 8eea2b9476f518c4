//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, usage flags, resource states and the
//! view descriptors written into descriptor heaps.

mod buffer;
mod common;
mod sampler;
mod state;
mod texture;
mod view;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use common::Extent3d;
pub use sampler::{AddressMode, FilterMode, StaticSampler};
pub use state::ResourceState;
pub use texture::{TextureDescriptor, TextureFormat, TextureUsage, mip_level_count};
pub use view::{BufferViewDesc, TextureSrvDesc, TextureUavDesc, TextureViewDimension};

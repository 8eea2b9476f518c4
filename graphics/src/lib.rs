//! # Skylight Graphics
//!
//! Reflection-probe baking on top of a small explicit compute API.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsDevice`] - Resource, pipeline and queue creation on a chosen backend
//! - [`DescriptorAllocator`] - Slot allocation over a fixed-capacity [`DescriptorHeap`]
//! - [`CommandList`] / [`CommandQueue`] - Recorded dispatches and barriers, executed in order
//! - [`GpuSync`] - Fence and event pair for waiting on submitted work
//! - [`ReflectionProbe`] - Environment cube and SH irradiance baking
//! - Two backends: wgpu (GPU) and a validating software reference
//!
//! ## Example
//!
//! ```ignore
//! use skylight_graphics::*;
//!
//! let device = GraphicsDevice::new(&GraphicsConfig::default())?;
//! let allocator = device.create_descriptor_allocator(Some("probe"))?;
//! let queue = device.create_command_queue(Some("main"));
//!
//! let mut context = CommandContext::new(Some("bake"));
//! context.reset();
//! let mut probe = ReflectionProbe::create(&device, context.list_mut(), &allocator, EnvMapQuality::Mid)?;
//! let sky = Texture2D::from_texels(&device, &allocator, width, height, &texels, Some("sky"))?;
//! probe.load_environment_map(&device, context.list_mut(), &sky)?;
//! context.submit(&queue)?;
//!
//! let mut sync = device.create_sync();
//! sync.signal(&queue)?;
//! sync.wait()?;
//! ```

mod backend;
mod config;
mod device;
mod error;

pub mod command;
pub mod descriptor;
pub mod ibl;
pub mod pipeline;
pub mod resources;
pub mod scheduler;
pub mod shader;
pub mod types;

// Re-export main types for convenience
pub use backend::{BackendKind, has_gpu_backend};
pub use command::{Command, CommandContext, CommandList, CommandQueue, ResourceBarrier};
pub use config::{DEFAULT_DESCRIPTOR_HEAP_CAPACITY, DEFAULT_WAIT_TIMEOUT, GraphicsConfig};
pub use descriptor::{
    Descriptor, DescriptorAllocator, DescriptorArena, DescriptorHeap, GpuDescriptorHandle, OwnedDescriptors,
    ResourceView, SharedDescriptorAllocator,
};
pub use device::GraphicsDevice;
pub use error::{AllocError, GraphicsError};
pub use ibl::{EnvMapQuality, ProbeExtent, ReflectionProbe, ShCoefficients};
pub use pipeline::{ComputePipeline, ComputePipelineDescriptor, RootSignature, RootSignatureDescriptor};
pub use resources::{Buffer, Resource, Texture, Texture2D};
pub use scheduler::{Event, Fence, GpuSync};
pub use shader::{ShaderBlob, ShaderLibrary};
pub use types::{
    BufferDescriptor, BufferUsage, Extent3d, ResourceState, TextureDescriptor, TextureFormat, TextureUsage,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Only logs; the application installs its own logger beforehand.
pub fn init() {
    log::info!(
        "Skylight Graphics v{} initialized (gpu backend compiled in: {})",
        VERSION,
        has_gpu_backend()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_software_device() {
        let device = GraphicsDevice::new(&GraphicsConfig::new().with_backend(BackendKind::Software)).unwrap();
        assert_eq!(device.backend_kind(), BackendKind::Software);
    }

    #[test]
    fn test_auto_never_fails() {
        let device = GraphicsDevice::new(&GraphicsConfig::default()).unwrap();
        assert_ne!(device.backend_kind(), BackendKind::Auto);
    }
}

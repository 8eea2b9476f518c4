//! GPU backend abstraction layer.
//!
//! The explicit API of this crate (descriptor heaps, root signatures, command
//! lists with barriers) is executed by one of two backends.
//!
//! # Available Backends
//!
//! - `software`: CPU reference backend. Runs the compute kernels natively,
//!   deterministically, and validates resource states and UAV hazards.
//! - `wgpu` (feature `wgpu-backend`, default): real GPU execution of the WGSL
//!   shaders through wgpu.
//!
//! # Architecture
//!
//! Each backend implements [`GpuBackend`], which provides:
//! - Resource creation with an initial resource state
//! - Root signature and compute pipeline creation
//! - Upload and readback
//! - Execution of resolved command lists and fence signaling

pub(crate) mod software;

#[cfg(feature = "wgpu-backend")]
pub(crate) mod wgpu_impl;

use std::sync::Arc;

use crate::command::replay::ReplayOp;
use crate::error::GraphicsError;
use crate::pipeline::{RootSignature, RootSignatureDescriptor};
use crate::resources::{Buffer, Texture};
use crate::scheduler::Fence;
use crate::shader::ShaderBlob;
use crate::types::{BufferDescriptor, ResourceState, TextureDescriptor};

use software::{SoftwareBuffer, SoftwareKernel, SoftwareTexture};

/// Which backend a device runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// wgpu if an adapter is available, software otherwise.
    #[default]
    Auto,
    /// CPU reference backend.
    Software,
    /// wgpu GPU backend.
    Wgpu,
}

impl BackendKind {
    /// Lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Software => "software",
            Self::Wgpu => "wgpu",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "software" | "cpu" => Ok(Self::Software),
            "wgpu" | "gpu" => Ok(Self::Wgpu),
            other => Err(format!("unknown backend '{other}', expected auto, software or wgpu")),
        }
    }
}

/// Handle to a backend texture.
#[derive(Clone)]
pub(crate) enum GpuTexture {
    /// Software backend texture
    Software(Arc<SoftwareTexture>),
    /// wgpu backend texture
    #[cfg(feature = "wgpu-backend")]
    Wgpu(Arc<wgpu::Texture>),
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Software(_) => write!(f, "GpuTexture::Software"),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(texture) => f.debug_tuple("GpuTexture::Wgpu").field(texture).finish(),
        }
    }
}

/// Handle to a backend buffer.
#[derive(Clone)]
pub(crate) enum GpuBuffer {
    /// Software backend buffer
    Software(Arc<SoftwareBuffer>),
    /// wgpu backend buffer
    #[cfg(feature = "wgpu-backend")]
    Wgpu(Arc<wgpu::Buffer>),
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Software(_) => write!(f, "GpuBuffer::Software"),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(buffer) => f.debug_tuple("GpuBuffer::Wgpu").field(buffer).finish(),
        }
    }
}

/// Backend side of a root signature.
#[derive(Clone)]
pub(crate) enum GpuRootSignature {
    /// The software backend reads the descriptor directly.
    Software,
    /// Bind group and pipeline layouts
    #[cfg(feature = "wgpu-backend")]
    Wgpu(Arc<wgpu_impl::WgpuRootSignature>),
}

impl std::fmt::Debug for GpuRootSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Software => write!(f, "GpuRootSignature::Software"),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(_) => write!(f, "GpuRootSignature::Wgpu"),
        }
    }
}

/// Backend side of a compute pipeline.
#[derive(Clone)]
pub(crate) enum GpuComputePipeline {
    /// Native kernel selected by entry point
    Software(SoftwareKernel),
    /// wgpu compute pipeline
    #[cfg(feature = "wgpu-backend")]
    Wgpu(Arc<wgpu::ComputePipeline>),
}

impl std::fmt::Debug for GpuComputePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Software(kernel) => f.debug_tuple("GpuComputePipeline::Software").field(kernel).finish(),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(pipeline) => f.debug_tuple("GpuComputePipeline::Wgpu").field(pipeline).finish(),
        }
    }
}

/// Trait implemented by every backend.
///
/// Texture data crosses this interface tightly packed, one subresource at a
/// time, in the texture's own format.
pub(crate) trait GpuBackend: Send + Sync {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Create a texture in `initial_state`.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        initial_state: ResourceState,
    ) -> Result<GpuTexture, GraphicsError>;

    /// Create a buffer in `initial_state`.
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_state: ResourceState,
    ) -> Result<GpuBuffer, GraphicsError>;

    /// Create the backend side of a validated root signature.
    fn create_root_signature(
        &self,
        descriptor: &RootSignatureDescriptor,
    ) -> Result<GpuRootSignature, GraphicsError>;

    /// Create a compute pipeline for a validated shader.
    fn create_compute_pipeline(
        &self,
        root_signature: &RootSignature,
        shader: &ShaderBlob,
        label: Option<&str>,
    ) -> Result<GpuComputePipeline, GraphicsError>;

    /// Upload one subresource.
    fn write_texture(&self, texture: &Texture, mip: u32, layer: u32, data: &[u8]) -> Result<(), GraphicsError>;

    /// Read back one subresource, waiting for submitted work.
    fn read_texture(&self, texture: &Texture, mip: u32, layer: u32) -> Result<Vec<u8>, GraphicsError>;

    /// Write bytes at `offset`.
    fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<(), GraphicsError>;

    /// Read back the whole buffer, waiting for submitted work.
    fn read_buffer(&self, buffer: &Buffer) -> Result<Vec<u8>, GraphicsError>;

    /// Execute resolved commands in order.
    fn execute(&self, ops: &[ReplayOp]) -> Result<(), GraphicsError>;

    /// Complete `fence` at `value` after all executed work.
    fn signal(&self, fence: &Fence, value: u64) -> Result<(), GraphicsError>;

    /// Block until all executed work has finished.
    fn wait_idle(&self) -> Result<(), GraphicsError>;
}

/// Creates the backend for `kind`.
///
/// `Auto` tries wgpu first and falls back to the software backend.
pub(crate) fn create_backend(kind: BackendKind, label: Option<&str>) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    match kind {
        BackendKind::Software => {
            log::info!("Using software backend");
            Ok(Arc::new(software::SoftwareBackend::new()))
        }
        BackendKind::Wgpu => create_wgpu_backend(label),
        BackendKind::Auto => match create_wgpu_backend(label) {
            Ok(backend) => Ok(backend),
            Err(e) => {
                log::warn!("Failed to create wgpu backend: {e}");
                log::info!("Using software backend");
                Ok(Arc::new(software::SoftwareBackend::new()))
            }
        },
    }
}

#[cfg(feature = "wgpu-backend")]
fn create_wgpu_backend(label: Option<&str>) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    let backend = wgpu_impl::WgpuBackend::new(label)?;
    log::info!("Using wgpu backend");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "wgpu-backend"))]
fn create_wgpu_backend(_label: Option<&str>) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    Err(GraphicsError::FeatureNotSupported(
        "wgpu backend (built without the wgpu-backend feature)".into(),
    ))
}

/// Check if a real GPU backend is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "wgpu-backend")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("software".parse::<BackendKind>(), Ok(BackendKind::Software));
        assert_eq!("WGPU".parse::<BackendKind>(), Ok(BackendKind::Wgpu));
        assert_eq!("auto".parse::<BackendKind>(), Ok(BackendKind::Auto));
        assert!("vulkan".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::default(), BackendKind::Auto);
        assert_eq!(BackendKind::Software.to_string(), "software");
    }

    #[test]
    fn test_software_backend_always_available() {
        let backend = create_backend(BackendKind::Software, None).unwrap();
        assert_eq!(backend.kind(), BackendKind::Software);
    }
}

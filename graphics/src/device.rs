//! Graphics device.
//!
//! The [`GraphicsDevice`] is the main interface for creating GPU resources,
//! pipelines and queues. It is created from a [`GraphicsConfig`], which picks
//! the backend the device runs on.

use std::sync::{Arc, Weak};

use bytemuck::Pod;
use parking_lot::RwLock;

use crate::backend::{self, BackendKind, GpuBackend};
use crate::command::CommandQueue;
use crate::config::GraphicsConfig;
use crate::descriptor::{DescriptorAllocator, DescriptorHeap, SharedDescriptorAllocator};
use crate::error::GraphicsError;
use crate::pipeline::{ComputePipeline, ComputePipelineDescriptor, RootSignature, RootSignatureDescriptor};
use crate::resources::{Buffer, Texture};
use crate::scheduler::GpuSync;
use crate::shader::ShaderLibrary;
use crate::types::{BufferDescriptor, ResourceState, TextureDescriptor, TextureFormat};

/// A graphics device for creating GPU resources.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync` and can be safely shared across threads.
///
/// # Example
///
/// ```ignore
/// let device = GraphicsDevice::new(&GraphicsConfig::default())?;
///
/// let buffer = device.create_buffer(
///     &BufferDescriptor::new(1024, BufferUsage::STORAGE),
///     ResourceState::UnorderedAccess,
/// )?;
/// let texture = device.create_texture(
///     &TextureDescriptor::new_cube(64, TextureFormat::Rgba32Float, usage),
///     ResourceState::ShaderResource,
/// )?;
/// ```
pub struct GraphicsDevice {
    config: GraphicsConfig,
    backend: Arc<dyn GpuBackend>,
    // Track allocated resources (weak references for cleanup/debugging)
    buffers: RwLock<Vec<Weak<Buffer>>>,
    textures: RwLock<Vec<Weak<Texture>>>,
}

impl GraphicsDevice {
    /// Create a device on the backend selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InitializationFailed`] if the requested backend
    /// is unavailable. `BackendKind::Auto` never fails this way; it falls back
    /// to the software backend.
    pub fn new(config: &GraphicsConfig) -> Result<Arc<Self>, GraphicsError> {
        if config.descriptor_heap_capacity == 0 {
            return Err(GraphicsError::InvalidParameter(
                "descriptor heap capacity must be non-zero".into(),
            ));
        }
        let backend = backend::create_backend(config.backend, config.label.as_deref())?;
        log::info!(
            "Creating GraphicsDevice {:?} on {}",
            config.label,
            backend.name()
        );
        Ok(Arc::new(Self {
            config: config.clone(),
            backend,
            buffers: RwLock::new(Vec::new()),
            textures: RwLock::new(Vec::new()),
        }))
    }

    /// Get the device name.
    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    /// Backend the device runs on; never `Auto`.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Configuration the device was created with.
    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    /// Library compute shaders are loaded from.
    pub fn shader_library(&self) -> &ShaderLibrary {
        &self.config.shader_library
    }

    /// Create a GPU texture in `initial_state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is invalid or allocation fails.
    pub fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        initial_state: ResourceState,
    ) -> Result<Arc<Texture>, GraphicsError> {
        if let Err(e) = descriptor.validate() {
            log::error!("GraphicsDevice: {e}");
            return Err(e);
        }

        let gpu = self.backend.create_texture(descriptor, initial_state)?;
        let texture = Arc::new(Texture::new(descriptor.clone(), gpu));
        self.textures.write().push(Arc::downgrade(&texture));

        log::trace!(
            "GraphicsDevice: created texture {:?}, size={}x{}x{}, mips={}, state={initial_state}",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth,
            descriptor.mip_level_count
        );

        Ok(texture)
    }

    /// Create a GPU buffer in `initial_state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is invalid or allocation fails.
    pub fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_state: ResourceState,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        if let Err(e) = descriptor.validate() {
            log::error!("GraphicsDevice: {e}");
            return Err(e);
        }

        let gpu = self.backend.create_buffer(descriptor, initial_state)?;
        let buffer = Arc::new(Buffer::new(descriptor.clone(), gpu));
        self.buffers.write().push(Arc::downgrade(&buffer));

        log::trace!(
            "GraphicsDevice: created buffer {:?}, size={}, state={initial_state}",
            descriptor.label,
            descriptor.size
        );

        Ok(buffer)
    }

    /// Create a descriptor heap with `capacity` slots.
    pub fn create_descriptor_heap(
        &self,
        capacity: u32,
        label: Option<&str>,
    ) -> Result<Arc<DescriptorHeap>, GraphicsError> {
        Ok(Arc::new(DescriptorHeap::new(capacity, label.map(str::to_owned))?))
    }

    /// Create a shared allocator over a new heap of the configured default capacity.
    pub fn create_descriptor_allocator(
        &self,
        label: Option<&str>,
    ) -> Result<SharedDescriptorAllocator, GraphicsError> {
        let heap = self.create_descriptor_heap(self.config.descriptor_heap_capacity, label)?;
        Ok(DescriptorAllocator::new(heap).into_shared())
    }

    /// Create a root signature.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::PipelineCreationFailed`] if the layout is
    /// invalid, or the backend's error if it cannot express it.
    pub fn create_root_signature(
        &self,
        descriptor: &RootSignatureDescriptor,
    ) -> Result<Arc<RootSignature>, GraphicsError> {
        if let Err(e) = descriptor.validate() {
            log::error!("GraphicsDevice: {e}");
            return Err(e);
        }
        let gpu = self.backend.create_root_signature(descriptor)?;
        log::trace!(
            "GraphicsDevice: created root signature {:?} with {} parameters",
            descriptor.label,
            descriptor.parameters.len()
        );
        Ok(Arc::new(RootSignature::new(descriptor.clone(), gpu)))
    }

    /// Create a compute pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::PipelineCreationFailed`] if the shader uses a
    /// binding the root signature does not declare.
    pub fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor<'_>,
    ) -> Result<Arc<ComputePipeline>, GraphicsError> {
        let binding_count = descriptor.root_signature.binding_count();
        if let Some(binding) = descriptor
            .shader
            .bindings()
            .iter()
            .find(|binding| **binding >= binding_count)
        {
            let e = GraphicsError::PipelineCreationFailed(format!(
                "{}: binding {binding} is not declared by root signature {:?} ({binding_count} bindings)",
                descriptor.shader.name(),
                descriptor.root_signature.descriptor().label
            ));
            log::error!("GraphicsDevice: {e}");
            return Err(e);
        }

        let gpu = self
            .backend
            .create_compute_pipeline(descriptor.root_signature, descriptor.shader, descriptor.label)?;
        log::trace!(
            "GraphicsDevice: created compute pipeline {:?} ({}, workgroup {:?})",
            descriptor.label,
            descriptor.shader.entry_point(),
            descriptor.shader.workgroup_size()
        );
        Ok(Arc::new(ComputePipeline::new(descriptor, gpu)))
    }

    /// Create a command queue.
    pub fn create_command_queue(&self, label: Option<&str>) -> CommandQueue {
        CommandQueue::new(Arc::clone(&self.backend), label)
    }

    /// Create a fence/event pair using the configured wait timeout.
    pub fn create_sync(&self) -> GpuSync {
        GpuSync::new().with_default_timeout(self.config.wait_timeout)
    }

    /// Upload one subresource of tightly packed texels in the texture's format.
    pub fn write_texture(&self, texture: &Texture, mip: u32, layer: u32, data: &[u8]) -> Result<(), GraphicsError> {
        self.backend.write_texture(texture, mip, layer, data)
    }

    /// Read back one subresource as tightly packed texels.
    pub fn read_texture(&self, texture: &Texture, mip: u32, layer: u32) -> Result<Vec<u8>, GraphicsError> {
        self.backend.read_texture(texture, mip, layer)
    }

    /// Read back one subresource of an RGBA32F texture.
    pub fn read_texture_texels(
        &self,
        texture: &Texture,
        mip: u32,
        layer: u32,
    ) -> Result<Vec<[f32; 4]>, GraphicsError> {
        if texture.format() != TextureFormat::Rgba32Float {
            return Err(GraphicsError::InvalidParameter(format!(
                "texel readback of {:?} needs Rgba32Float, found {:?}",
                texture.label(),
                texture.format()
            )));
        }
        let bytes = self.read_texture(texture, mip, layer)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Write bytes into a buffer at `offset`.
    pub fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        self.backend.write_buffer(buffer, offset, data)
    }

    /// Read back the whole buffer.
    pub fn read_buffer(&self, buffer: &Buffer) -> Result<Vec<u8>, GraphicsError> {
        self.backend.read_buffer(buffer)
    }

    /// Read back a buffer as structured elements.
    pub fn read_structured<T: Pod>(&self, buffer: &Buffer) -> Result<Vec<T>, GraphicsError> {
        let bytes = self.read_buffer(buffer)?;
        let stride = std::mem::size_of::<T>();
        let whole = bytes.len() - bytes.len() % stride;
        Ok(bytemuck::pod_collect_to_vec(&bytes[..whole]))
    }

    /// Block until every submitted command list has finished.
    pub fn wait_idle(&self) -> Result<(), GraphicsError> {
        self.backend.wait_idle()
    }

    /// Get the number of live buffers created by this device.
    pub fn buffer_count(&self) -> usize {
        self.buffers.read().iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Get the number of live textures created by this device.
    pub fn texture_count(&self) -> usize {
        self.textures.read().iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Clean up dead weak references to released resources.
    pub fn cleanup_dead_resources(&self) {
        self.buffers.write().retain(|w| w.strong_count() > 0);
        self.textures.write().retain(|w| w.strong_count() > 0);
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("name", &self.name())
            .field("label", &self.config.label)
            .finish()
    }
}

// Ensure GraphicsDevice is Send + Sync
static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);

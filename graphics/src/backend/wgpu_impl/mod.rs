//! wgpu GPU backend implementation.
//!
//! This backend uses wgpu for cross-platform GPU access, supporting
//! Vulkan, Metal, DX12, and WebGPU.
//!
//! Root signatures become one bind group layout: parameter `N` at binding
//! `N`, static samplers after the parameters. Root constants are packed into a
//! per-submission uniform buffer and bound with a dynamic offset. wgpu tracks
//! resource states itself, so recorded barriers are only logged.

pub(crate) mod conversion;
mod execute;

use std::sync::Arc;

use super::{BackendKind, GpuBackend, GpuBuffer, GpuComputePipeline, GpuRootSignature, GpuTexture};
use crate::command::replay::ReplayOp;
use crate::error::GraphicsError;
use crate::pipeline::{RootParameter, RootSignature, RootSignatureDescriptor};
use crate::resources::{Buffer, Texture};
use crate::scheduler::Fence;
use crate::shader::ShaderBlob;
use crate::types::{BufferDescriptor, BufferUsage, FilterMode, ResourceState, TextureDescriptor, TextureUsage};

/// Backend side of a root signature.
pub(crate) struct WgpuRootSignature {
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub samplers: Vec<wgpu::Sampler>,
    pub parameters: Vec<RootParameter>,
}

/// wgpu-based GPU backend.
pub(crate) struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    limits: wgpu::Limits,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .finish()
    }
}

impl WgpuBackend {
    /// Create a backend on the highest performance adapter available.
    pub fn new(label: Option<&str>) -> Result<Self, GraphicsError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("No compatible GPU adapter: {e}")))?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some(label.unwrap_or("Skylight Device")),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("Device creation failed: {e}")))?;

        let limits = device.limits();
        log::debug!(
            "wgpu limits: max_buffer_size={} max_storage_buffer_binding_size={} max_texture_dimension_2d={}",
            limits.max_buffer_size,
            limits.max_storage_buffer_binding_size,
            limits.max_texture_dimension_2d
        );

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            limits,
        })
    }

    /// Map a `MAP_READ` buffer and copy its contents out.
    fn map_read(&self, staging: &wgpu::Buffer) -> Result<Vec<u8>, GraphicsError> {
        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(GraphicsError::ExecutionFailed(format!("buffer mapping failed: {e}"))),
            Err(_) => return Err(GraphicsError::DeviceLost),
        }
        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }

    fn create_staging(&self, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }
}

pub(crate) fn wgpu_texture(texture: &Texture) -> Result<&Arc<wgpu::Texture>, GraphicsError> {
    match texture.gpu() {
        GpuTexture::Wgpu(texture) => Ok(texture),
        GpuTexture::Software(_) => Err(GraphicsError::InvalidParameter(format!(
            "texture {:?} was not created by the wgpu backend",
            texture.label()
        ))),
    }
}

pub(crate) fn wgpu_buffer(buffer: &Buffer) -> Result<&Arc<wgpu::Buffer>, GraphicsError> {
    match buffer.gpu() {
        GpuBuffer::Wgpu(buffer) => Ok(buffer),
        GpuBuffer::Software(_) => Err(GraphicsError::InvalidParameter(format!(
            "buffer {:?} was not created by the wgpu backend",
            buffer.label()
        ))),
    }
}

fn copy_extent(texture: &Texture, mip: u32, layer: u32) -> Result<wgpu::Extent3d, GraphicsError> {
    if mip >= texture.mip_level_count() || layer >= texture.array_layers() {
        return Err(GraphicsError::InvalidParameter(format!(
            "subresource (mip {mip}, layer {layer}) out of range for texture {:?}",
            texture.label()
        )));
    }
    let size = texture.size().mip_level_size(mip);
    Ok(wgpu::Extent3d {
        width: size.width,
        height: size.height,
        depth_or_array_layers: 1,
    })
}

fn texel_copy(texture: &wgpu::Texture, mip: u32, layer: u32) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture,
        mip_level: mip,
        origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
        aspect: wgpu::TextureAspect::All,
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu Backend"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Wgpu
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        _initial_state: ResourceState,
    ) -> Result<GpuTexture, GraphicsError> {
        let max = self.limits.max_texture_dimension_2d;
        if descriptor.size.width > max || descriptor.size.height > max {
            return Err(GraphicsError::ResourceCreationFailed(format!(
                "texture {:?} of {}x{} exceeds the device limit of {max}",
                descriptor.label, descriptor.size.width, descriptor.size.height
            )));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: wgpu::Extent3d {
                width: descriptor.size.width,
                height: descriptor.size.height,
                depth_or_array_layers: descriptor.array_layers(),
            },
            mip_level_count: descriptor.mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: conversion::convert_texture_format(descriptor.format),
            usage: conversion::convert_texture_usage(descriptor.usage),
            view_formats: &[],
        });
        Ok(GpuTexture::Wgpu(Arc::new(texture)))
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        _initial_state: ResourceState,
    ) -> Result<GpuBuffer, GraphicsError> {
        if descriptor.size > self.limits.max_buffer_size {
            return Err(GraphicsError::ResourceCreationFailed(format!(
                "buffer {:?} of {} bytes exceeds the device limit of {}",
                descriptor.label, descriptor.size, self.limits.max_buffer_size
            )));
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size,
            usage: conversion::convert_buffer_usage(descriptor.usage),
            mapped_at_creation: false,
        });
        Ok(GpuBuffer::Wgpu(Arc::new(buffer)))
    }

    fn create_root_signature(
        &self,
        descriptor: &RootSignatureDescriptor,
    ) -> Result<GpuRootSignature, GraphicsError> {
        if descriptor
            .static_samplers
            .iter()
            .any(|sampler| sampler.filter != FilterMode::Nearest)
        {
            // Every sampled texture is RGBA32F, which is not filterable without extra features.
            return Err(GraphicsError::FeatureNotSupported(format!(
                "filtered static samplers in root signature {:?}",
                descriptor.label
            )));
        }

        let mut entries: Vec<wgpu::BindGroupLayoutEntry> = descriptor
            .parameters
            .iter()
            .enumerate()
            .map(|(binding, parameter)| conversion::convert_root_parameter(binding as u32, parameter))
            .collect();
        let first_sampler = descriptor.parameters.len() as u32;
        entries.extend((0..descriptor.static_samplers.len() as u32).map(|s| wgpu::BindGroupLayoutEntry {
            binding: first_sampler + s,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
            count: None,
        }));

        let label = descriptor.label.as_deref();
        let bind_group_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor { label, entries: &entries });
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label,
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });
        let samplers = descriptor
            .static_samplers
            .iter()
            .map(|sampler| self.device.create_sampler(&conversion::convert_static_sampler(sampler)))
            .collect();

        Ok(GpuRootSignature::Wgpu(Arc::new(WgpuRootSignature {
            bind_group_layout,
            pipeline_layout,
            samplers,
            parameters: descriptor.parameters.clone(),
        })))
    }

    fn create_compute_pipeline(
        &self,
        root_signature: &RootSignature,
        shader: &ShaderBlob,
        label: Option<&str>,
    ) -> Result<GpuComputePipeline, GraphicsError> {
        let GpuRootSignature::Wgpu(signature) = root_signature.gpu() else {
            return Err(GraphicsError::PipelineCreationFailed(format!(
                "{label:?}: root signature was not created by the wgpu backend"
            )));
        };

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(shader.name()),
            source: wgpu::ShaderSource::Wgsl(shader.source().into()),
        });
        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label,
            layout: Some(&signature.pipeline_layout),
            module: &module,
            entry_point: Some(shader.entry_point()),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        Ok(GpuComputePipeline::Wgpu(Arc::new(pipeline)))
    }

    fn write_texture(&self, texture: &Texture, mip: u32, layer: u32, data: &[u8]) -> Result<(), GraphicsError> {
        if !texture.descriptor().usage.contains(TextureUsage::COPY_DST) {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} was not created with COPY_DST",
                texture.label()
            )));
        }
        let extent = copy_extent(texture, mip, layer)?;
        let bytes_per_row = extent.width * texture.format().block_size();
        let expected = bytes_per_row as usize * extent.height as usize;
        if data.len() != expected {
            return Err(GraphicsError::InvalidParameter(format!(
                "upload of {} bytes to {}x{} {:?} subresource, expected {expected}",
                data.len(),
                extent.width,
                extent.height,
                texture.format()
            )));
        }

        self.queue.write_texture(
            texel_copy(wgpu_texture(texture)?, mip, layer),
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(extent.height),
            },
            extent,
        );
        Ok(())
    }

    fn read_texture(&self, texture: &Texture, mip: u32, layer: u32) -> Result<Vec<u8>, GraphicsError> {
        if !texture.descriptor().usage.contains(TextureUsage::COPY_SRC) {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} was not created with COPY_SRC",
                texture.label()
            )));
        }
        let extent = copy_extent(texture, mip, layer)?;
        let row_bytes = extent.width * texture.format().block_size();
        let padded_row = row_bytes.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let staging = self.create_staging(u64::from(padded_row) * u64::from(extent.height));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Texture Readback"),
            });
        encoder.copy_texture_to_buffer(
            texel_copy(wgpu_texture(texture)?, mip, layer),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(extent.height),
                },
            },
            extent,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let padded = self.map_read(&staging)?;
        Ok(padded
            .chunks_exact(padded_row as usize)
            .flat_map(|row| &row[..row_bytes as usize])
            .copied()
            .collect())
    }

    fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        if !buffer.descriptor().usage.contains(BufferUsage::COPY_DST) {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {:?} was not created with COPY_DST",
                buffer.label()
            )));
        }
        let end = offset.checked_add(data.len() as u64).filter(|end| *end <= buffer.size());
        if end.is_none() || offset % 4 != 0 || data.len() % 4 != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at {offset} into buffer of {} bytes (4-byte aligned ranges only)",
                data.len(),
                buffer.size()
            )));
        }
        self.queue.write_buffer(wgpu_buffer(buffer)?, offset, data);
        Ok(())
    }

    fn read_buffer(&self, buffer: &Buffer) -> Result<Vec<u8>, GraphicsError> {
        if !buffer.descriptor().usage.contains(BufferUsage::COPY_SRC) {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {:?} was not created with COPY_SRC",
                buffer.label()
            )));
        }
        let staging = self.create_staging(buffer.size());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Buffer Readback"),
            });
        encoder.copy_buffer_to_buffer(wgpu_buffer(buffer)?, 0, &staging, 0, buffer.size());
        self.queue.submit(std::iter::once(encoder.finish()));
        self.map_read(&staging)
    }

    fn execute(&self, ops: &[ReplayOp]) -> Result<(), GraphicsError> {
        let commands = execute::encode(self, ops)?;
        self.queue.submit(std::iter::once(commands));
        Ok(())
    }

    fn signal(&self, fence: &Fence, value: u64) -> Result<(), GraphicsError> {
        let fence = fence.clone();
        self.queue.on_submitted_work_done(move || fence.complete(value));

        // Callbacks only fire while the device is polled.
        let device = Arc::clone(&self.device);
        std::thread::Builder::new()
            .name("skylight-fence-poll".into())
            .spawn(move || {
                report_fence_poll(device.poll(wgpu::PollType::wait_indefinitely()), value);
            })
            .map_err(|e| GraphicsError::Internal(format!("failed to spawn fence poll thread: {e}")))?;
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), GraphicsError> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| GraphicsError::ExecutionFailed(format!("device poll failed: {e}")))
    }
}

/// Logs a failed fence poll. Returns whether the poll succeeded.
fn report_fence_poll(result: Result<wgpu::PollStatus, wgpu::PollError>, value: u64) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            log::error!("wgpu: device poll for fence value {value} failed: {e}");
            false
        }
    }
}

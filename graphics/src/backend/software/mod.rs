//! CPU reference backend.
//!
//! Executes dispatches synchronously on the calling thread, one thread group
//! after another, so results are deterministic. Every operation is also
//! checked the way a debug layer would:
//!
//! - a transition's `before` state must match the tracked state;
//! - SRVs may only be read in `ShaderResource`, UAVs only used in
//!   `UnorderedAccess`;
//! - a subresource written through a UAV may not be accessed again before a
//!   UAV barrier or a transition on its resource;
//! - a resource may not be bound twice in one dispatch if either binding is a
//!   UAV.

mod kernels;
mod memory;

pub(crate) use kernels::SoftwareKernel;
pub(crate) use memory::{SoftwareBuffer, SoftwareTexture};

use std::sync::Arc;

use parking_lot::Mutex;

use super::{BackendKind, GpuBackend, GpuBuffer, GpuComputePipeline, GpuRootSignature, GpuTexture};
use crate::command::ResourceBarrier;
use crate::command::replay::{ReplayOp, ResolvedDispatch};
use crate::descriptor::ResourceView;
use crate::error::GraphicsError;
use crate::pipeline::{RootSignature, RootSignatureDescriptor};
use crate::resources::{Buffer, Resource, ResourceId, Texture};
use crate::scheduler::Fence;
use crate::shader::ShaderBlob;
use crate::types::{BufferDescriptor, FilterMode, ResourceState, TextureDescriptor};
use kernels::{KernelDispatch, software_buffer, software_texture};
use memory::StateTracker;

/// Software backend.
#[derive(Debug, Default)]
pub(crate) struct SoftwareBackend {
    // Serializes execution the way a single hardware queue would.
    queue: Mutex<()>,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One resource access made by a dispatch.
struct Access<'a> {
    view: &'a ResourceView,
    parameter: u32,
    subresources: Vec<u32>,
}

impl<'a> Access<'a> {
    fn new(parameter: u32, view: &'a ResourceView) -> Self {
        let subresources = match view {
            ResourceView::TextureSrv { texture, desc } => {
                let descriptor = texture.descriptor();
                (0..descriptor.array_layers())
                    .flat_map(|layer| {
                        (desc.most_detailed_mip..desc.most_detailed_mip + desc.mip_levels)
                            .map(move |mip| descriptor.subresource_index(mip, layer))
                    })
                    .collect()
            }
            ResourceView::TextureUav { texture, desc } => (desc.first_array_slice
                ..desc.first_array_slice + desc.array_size)
                .map(|layer| texture.descriptor().subresource_index(desc.mip_slice, layer))
                .collect(),
            ResourceView::BufferSrv { .. } | ResourceView::BufferUav { .. } => vec![0],
        };
        Self {
            view,
            parameter,
            subresources,
        }
    }

    fn resource_id(&self) -> ResourceId {
        match self.view {
            ResourceView::TextureSrv { texture, .. } | ResourceView::TextureUav { texture, .. } => texture.id(),
            ResourceView::BufferSrv { buffer, .. } | ResourceView::BufferUav { buffer, .. } => buffer.id(),
        }
    }

    fn required_state(&self) -> ResourceState {
        if self.view.is_uav() {
            ResourceState::UnorderedAccess
        } else {
            ResourceState::ShaderResource
        }
    }

    fn with_tracker<R>(&self, f: impl FnOnce(&mut StateTracker) -> R) -> Result<R, GraphicsError> {
        match self.view {
            ResourceView::TextureSrv { texture, .. } | ResourceView::TextureUav { texture, .. } => {
                Ok(f(&mut software_texture(texture)?.tracker().lock()))
            }
            ResourceView::BufferSrv { buffer, .. } | ResourceView::BufferUav { buffer, .. } => {
                Ok(f(&mut software_buffer(buffer)?.tracker().lock()))
            }
        }
    }
}

fn with_resource_tracker<R>(
    resource: &Resource,
    f: impl FnOnce(&mut StateTracker) -> R,
) -> Result<R, GraphicsError> {
    match resource {
        Resource::Texture(texture) => Ok(f(&mut software_texture(texture)?.tracker().lock())),
        Resource::Buffer(buffer) => Ok(f(&mut software_buffer(buffer)?.tracker().lock())),
    }
}

fn apply_barriers(barriers: &[ResourceBarrier]) -> Result<(), GraphicsError> {
    for barrier in barriers {
        match barrier {
            ResourceBarrier::Transition {
                resource,
                before,
                after,
            } => {
                with_resource_tracker(resource, |tracker| tracker.transition(*before, *after))??;
                log::trace!("SoftwareBackend: {:?} {before} -> {after}", resource.label());
            }
            ResourceBarrier::Uav { resource } => {
                with_resource_tracker(resource, StateTracker::uav_barrier)?;
            }
        }
    }
    Ok(())
}

fn run_dispatch(dispatch: &ResolvedDispatch) -> Result<(), GraphicsError> {
    let GpuComputePipeline::Software(kernel) = dispatch.pipeline.gpu() else {
        return Err(GraphicsError::InvalidParameter(format!(
            "pipeline {} was not created by the software backend",
            dispatch.label()
        )));
    };

    let accesses: Vec<Access<'_>> = dispatch
        .views()
        .map(|(parameter, view)| Access::new(parameter, view))
        .collect();

    for (i, a) in accesses.iter().enumerate() {
        for b in &accesses[i + 1..] {
            if a.resource_id() == b.resource_id() && (a.view.is_uav() || b.view.is_uav()) {
                return Err(GraphicsError::Hazard(format!(
                    "{}: resource {:?} bound to parameters {} and {} with write access",
                    dispatch.label(),
                    a.view.resource().label(),
                    a.parameter,
                    b.parameter
                )));
            }
        }
    }

    for access in &accesses {
        let kind = if access.view.is_uav() { "UAV access" } else { "SRV read" };
        access.with_tracker(|tracker| {
            tracker.check_access(access.required_state(), &access.subresources, kind)
        })??;
    }

    log::trace!(
        "SoftwareBackend: dispatch {} {:?}",
        dispatch.label(),
        dispatch.groups
    );
    kernel.run(&KernelDispatch {
        constants: &dispatch.constants,
        tables: &dispatch.tables,
        groups: dispatch.groups,
    })?;

    for access in accesses.iter().filter(|access| access.view.is_uav()) {
        access.with_tracker(|tracker| tracker.mark_written(&access.subresources))?;
    }
    Ok(())
}

impl GpuBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "Software Backend"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        initial_state: ResourceState,
    ) -> Result<GpuTexture, GraphicsError> {
        Ok(GpuTexture::Software(Arc::new(SoftwareTexture::new(descriptor, initial_state))))
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_state: ResourceState,
    ) -> Result<GpuBuffer, GraphicsError> {
        Ok(GpuBuffer::Software(Arc::new(SoftwareBuffer::new(descriptor, initial_state))))
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
            return Err(GraphicsError::FeatureNotSupported(format!(
                "filtered static samplers in root signature {:?}",
                descriptor.label
            )));
        }
        Ok(GpuRootSignature::Software)
    }

    fn create_compute_pipeline(
        &self,
        _root_signature: &RootSignature,
        shader: &ShaderBlob,
        label: Option<&str>,
    ) -> Result<GpuComputePipeline, GraphicsError> {
        let kernel = SoftwareKernel::from_entry_point(shader.entry_point()).ok_or_else(|| {
            GraphicsError::PipelineCreationFailed(format!(
                "{label:?}: no software kernel for entry point '{}'",
                shader.entry_point()
            ))
        })?;
        if kernel.workgroup_size() != shader.workgroup_size() {
            return Err(GraphicsError::PipelineCreationFailed(format!(
                "{label:?}: shader workgroup {:?} does not match the software kernel's {:?}",
                shader.workgroup_size(),
                kernel.workgroup_size()
            )));
        }
        Ok(GpuComputePipeline::Software(kernel))
    }

    fn write_texture(&self, texture: &Texture, mip: u32, layer: u32, data: &[u8]) -> Result<(), GraphicsError> {
        software_texture(texture)?.write(mip, layer, data)
    }

    fn read_texture(&self, texture: &Texture, mip: u32, layer: u32) -> Result<Vec<u8>, GraphicsError> {
        software_texture(texture)?.read(mip, layer)
    }

    fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        software_buffer(buffer)?.write(offset, data)
    }

    fn read_buffer(&self, buffer: &Buffer) -> Result<Vec<u8>, GraphicsError> {
        Ok(software_buffer(buffer)?.read())
    }

    fn execute(&self, ops: &[ReplayOp]) -> Result<(), GraphicsError> {
        let _queue = self.queue.lock();
        for (index, op) in ops.iter().enumerate() {
            let result = match op {
                ReplayOp::Barrier(barriers) => apply_barriers(barriers),
                ReplayOp::Dispatch(dispatch) => run_dispatch(dispatch),
            };
            if let Err(e) = &result {
                log::error!("SoftwareBackend: operation {index} failed: {e}");
            }
            result?;
        }
        Ok(())
    }

    fn signal(&self, fence: &Fence, value: u64) -> Result<(), GraphicsError> {
        // Work is complete by the time execute returns.
        let _queue = self.queue.lock();
        fence.complete(value);
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), GraphicsError> {
        Ok(())
    }
}

//! Encoding of resolved command lists into one compute pass.

use std::num::NonZeroU64;
use std::sync::Arc;

use super::conversion::{constants_binding_size, convert_view_dimension};
use super::{WgpuBackend, WgpuRootSignature, wgpu_buffer, wgpu_texture};
use crate::backend::{GpuComputePipeline, GpuRootSignature};
use crate::command::ResourceBarrier;
use crate::command::replay::{ReplayOp, ResolvedDispatch};
use crate::descriptor::ResourceView;
use crate::error::GraphicsError;
use crate::pipeline::RootParameter;
use crate::types::{BufferViewDesc, TextureViewDimension};

/// A resource bound to one binding of a dispatch.
enum Bound {
    Constants { offset: u32, size: u64 },
    Texture(wgpu::TextureView),
    Buffer { buffer: Arc<wgpu::Buffer>, offset: u64, size: u64 },
}

/// A dispatch ready to be encoded.
struct Prepared<'a> {
    pipeline: &'a wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    dynamic_offsets: Vec<u32>,
    groups: [u32; 3],
}

fn parts(dispatch: &ResolvedDispatch) -> Result<(&wgpu::ComputePipeline, &WgpuRootSignature), GraphicsError> {
    let GpuComputePipeline::Wgpu(pipeline) = dispatch.pipeline.gpu() else {
        return Err(GraphicsError::InvalidParameter(format!(
            "pipeline {} was not created by the wgpu backend",
            dispatch.label()
        )));
    };
    let GpuRootSignature::Wgpu(signature) = dispatch.pipeline.root_signature().gpu() else {
        return Err(GraphicsError::InvalidParameter(format!(
            "root signature of {} was not created by the wgpu backend",
            dispatch.label()
        )));
    };
    Ok((&**pipeline, &**signature))
}

fn texture_view(view: &ResourceView) -> Result<Option<wgpu::TextureView>, GraphicsError> {
    let descriptor = match view {
        ResourceView::TextureSrv { texture, desc } => (
            texture,
            wgpu::TextureViewDescriptor {
                label: texture.label(),
                dimension: Some(convert_view_dimension(desc.dimension)),
                base_mip_level: desc.most_detailed_mip,
                mip_level_count: Some(desc.mip_levels),
                base_array_layer: 0,
                array_layer_count: Some(match desc.dimension {
                    TextureViewDimension::D2 => 1,
                    TextureViewDimension::Cube | TextureViewDimension::D2Array => texture.array_layers(),
                }),
                ..Default::default()
            },
        ),
        ResourceView::TextureUav { texture, desc } => (
            texture,
            wgpu::TextureViewDescriptor {
                label: texture.label(),
                dimension: Some(wgpu::TextureViewDimension::D2Array),
                base_mip_level: desc.mip_slice,
                mip_level_count: Some(1),
                base_array_layer: desc.first_array_slice,
                array_layer_count: Some(desc.array_size),
                ..Default::default()
            },
        ),
        ResourceView::BufferSrv { .. } | ResourceView::BufferUav { .. } => return Ok(None),
    };
    let (texture, view_descriptor) = descriptor;
    Ok(Some(wgpu_texture(texture)?.create_view(&view_descriptor)))
}

fn buffer_binding(
    backend: &WgpuBackend,
    dispatch: &ResolvedDispatch,
    desc: &BufferViewDesc,
) -> Result<(u64, u64), GraphicsError> {
    let offset = desc.byte_offset();
    let size = desc.byte_len();
    let alignment = u64::from(backend.limits.min_storage_buffer_offset_alignment);
    if offset % alignment != 0 {
        return Err(GraphicsError::ExecutionFailed(format!(
            "{}: buffer view offset {offset} is not a multiple of {alignment}",
            dispatch.label()
        )));
    }
    if size > u64::from(backend.limits.max_storage_buffer_binding_size) {
        return Err(GraphicsError::ExecutionFailed(format!(
            "{}: buffer view of {size} bytes exceeds the storage binding limit of {}",
            dispatch.label(),
            backend.limits.max_storage_buffer_binding_size
        )));
    }
    Ok((offset, size))
}

/// Root constants of every dispatch packed at dynamic-offset aligned slots.
struct ConstantsArena {
    bytes: Vec<u8>,
    alignment: u32,
}

impl ConstantsArena {
    fn push(&mut self, values: &[u32], binding_size: u64) -> u32 {
        let offset = (self.bytes.len() as u32).next_multiple_of(self.alignment);
        self.bytes.resize(offset as usize + binding_size as usize, 0);
        let start = offset as usize;
        self.bytes[start..start + values.len() * 4].copy_from_slice(bytemuck::cast_slice(values));
        offset
    }
}

/// Encode `ops` into a command buffer.
pub(super) fn encode(backend: &WgpuBackend, ops: &[ReplayOp]) -> Result<wgpu::CommandBuffer, GraphicsError> {
    let mut arena = ConstantsArena {
        bytes: Vec::new(),
        alignment: backend.limits.min_uniform_buffer_offset_alignment,
    };

    // Resolve every binding first; the uniform buffer must exist before any bind group.
    let mut bound_per_dispatch = Vec::new();
    for op in ops {
        let ReplayOp::Dispatch(dispatch) = op else { continue };
        let (_, signature) = parts(dispatch)?;
        let mut bound = Vec::with_capacity(signature.parameters.len());
        for (index, parameter) in signature.parameters.iter().enumerate() {
            let entry = match parameter {
                RootParameter::Constants { num_values } => {
                    let size = constants_binding_size(*num_values);
                    Bound::Constants {
                        offset: arena.push(&dispatch.constants, size),
                        size,
                    }
                }
                RootParameter::DescriptorTable(_) => {
                    let view = dispatch.tables.get(index).and_then(Option::as_ref).ok_or_else(|| {
                        GraphicsError::Internal(format!("{}: table {index} unresolved", dispatch.label()))
                    })?;
                    match view {
                        ResourceView::BufferSrv { buffer, desc } | ResourceView::BufferUav { buffer, desc } => {
                            let (offset, size) = buffer_binding(backend, dispatch, desc)?;
                            Bound::Buffer {
                                buffer: Arc::clone(wgpu_buffer(buffer)?),
                                offset,
                                size,
                            }
                        }
                        _ => match texture_view(view)? {
                            Some(view) => Bound::Texture(view),
                            None => {
                                return Err(GraphicsError::Internal(format!(
                                    "{}: table {index} has no texture view",
                                    dispatch.label()
                                )));
                            }
                        },
                    }
                }
            };
            bound.push(entry);
        }
        bound_per_dispatch.push(bound);
    }

    let constants = (!arena.bytes.is_empty()).then(|| {
        let buffer = backend.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Root Constants"),
            size: arena.bytes.len() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        backend.queue.write_buffer(&buffer, 0, &arena.bytes);
        buffer
    });

    let mut prepared = Vec::with_capacity(bound_per_dispatch.len());
    let dispatches = ops.iter().filter_map(|op| match op {
        ReplayOp::Dispatch(dispatch) => Some(dispatch),
        ReplayOp::Barrier(_) => None,
    });
    for (dispatch, bound) in dispatches.zip(&bound_per_dispatch) {
        let (pipeline, signature) = parts(dispatch)?;
        let mut entries = Vec::with_capacity(bound.len() + signature.samplers.len());
        let mut dynamic_offsets = Vec::new();
        for (binding, entry) in bound.iter().enumerate() {
            let resource = match entry {
                Bound::Constants { offset, size } => {
                    let Some(buffer) = constants.as_ref() else {
                        return Err(GraphicsError::Internal("root constants buffer missing".into()));
                    };
                    dynamic_offsets.push(*offset);
                    wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: 0,
                        size: NonZeroU64::new(*size),
                    })
                }
                Bound::Texture(view) => wgpu::BindingResource::TextureView(view),
                Bound::Buffer { buffer, offset, size } => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: *offset,
                    size: NonZeroU64::new(*size),
                }),
            };
            entries.push(wgpu::BindGroupEntry {
                binding: binding as u32,
                resource,
            });
        }
        let first_sampler = bound.len() as u32;
        for (s, sampler) in signature.samplers.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: first_sampler + s as u32,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }

        let bind_group = backend.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(dispatch.label()),
            layout: &signature.bind_group_layout,
            entries: &entries,
        });
        prepared.push(Prepared {
            pipeline,
            bind_group,
            dynamic_offsets,
            groups: dispatch.groups,
        });
    }

    let mut encoder = backend
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Command List"),
        });
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Command List Pass"),
            timestamp_writes: None,
        });
        let mut next = prepared.iter();
        for op in ops {
            match op {
                ReplayOp::Barrier(barriers) => log_barriers(barriers),
                ReplayOp::Dispatch(_) => {
                    let Some(dispatch) = next.next() else {
                        return Err(GraphicsError::Internal("dispatch count mismatch".into()));
                    };
                    let [x, y, z] = dispatch.groups;
                    pass.set_pipeline(dispatch.pipeline);
                    pass.set_bind_group(0, &dispatch.bind_group, &dispatch.dynamic_offsets);
                    pass.dispatch_workgroups(x, y, z);
                }
            }
        }
    }
    Ok(encoder.finish())
}

fn log_barriers(barriers: &[ResourceBarrier]) {
    for barrier in barriers {
        match barrier {
            ResourceBarrier::Transition {
                resource,
                before,
                after,
            } => log::trace!("WgpuBackend: {:?} {before} -> {after}", resource.label()),
            ResourceBarrier::Uav { resource } => log::trace!("WgpuBackend: UAV barrier on {:?}", resource.label()),
        }
    }
}

//! Compute pipeline state.

use std::sync::Arc;

use super::RootSignature;
use crate::backend::GpuComputePipeline;
use crate::shader::ShaderBlob;

/// Descriptor for creating a compute pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ComputePipelineDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// Root signature the shader is bound through.
    pub root_signature: &'a Arc<RootSignature>,
    /// Validated compute shader.
    pub shader: &'a ShaderBlob,
}

/// A compute pipeline: a root signature plus a compute shader.
#[derive(Debug)]
pub struct ComputePipeline {
    label: Option<String>,
    root_signature: Arc<RootSignature>,
    entry_point: String,
    workgroup_size: [u32; 3],
    gpu: GpuComputePipeline,
}

impl ComputePipeline {
    pub(crate) fn new(
        descriptor: &ComputePipelineDescriptor<'_>,
        gpu: GpuComputePipeline,
    ) -> Self {
        Self {
            label: descriptor.label.map(str::to_owned),
            root_signature: Arc::clone(descriptor.root_signature),
            entry_point: descriptor.shader.entry_point().to_owned(),
            workgroup_size: descriptor.shader.workgroup_size(),
            gpu,
        }
    }

    /// Debug label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The root signature of the pipeline.
    pub fn root_signature(&self) -> &Arc<RootSignature> {
        &self.root_signature
    }

    /// Compute entry point name.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Threads per workgroup.
    pub fn workgroup_size(&self) -> [u32; 3] {
        self.workgroup_size
    }

    /// Backend handle.
    pub(crate) fn gpu(&self) -> &GpuComputePipeline {
        &self.gpu
    }
}

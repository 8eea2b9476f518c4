//! Root signatures and compute pipelines.
//!
//! A [`RootSignature`] describes what a compute shader binds: at most one block
//! of 32-bit root constants, a list of single-descriptor tables and a set of
//! static samplers. A [`ComputePipeline`] pairs a root signature with a
//! validated [`ShaderBlob`](crate::shader::ShaderBlob).
//!
//! Shader binding `N` of bind group 0 corresponds to root parameter `N`;
//! static samplers follow the parameters in declaration order.

mod compute;
mod root_signature;

pub use compute::{ComputePipeline, ComputePipelineDescriptor};
pub use root_signature::{
    DescriptorRange, DescriptorRangeKind, MAX_ROOT_CONSTANTS, MAX_ROOT_PARAMETERS, RangeDimension,
    RootParameter, RootSignature, RootSignatureDescriptor,
};

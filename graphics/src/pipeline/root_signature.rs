//! Root signature description and validation.

use crate::backend::GpuRootSignature;
use crate::descriptor::ResourceView;
use crate::error::GraphicsError;
use crate::types::{StaticSampler, TextureViewDimension};

/// Maximum number of 32-bit root constants.
pub const MAX_ROOT_CONSTANTS: u32 = 64;

/// Maximum number of root parameters.
pub const MAX_ROOT_PARAMETERS: usize = 16;

/// Access kind of a descriptor range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorRangeKind {
    /// Shader resource view (read only).
    Srv,
    /// Unordered access view (read-write).
    Uav,
}

/// Resource shape expected by a descriptor range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeDimension {
    /// A single 2D texture.
    Texture2D,
    /// A cube map.
    TextureCube,
    /// A 2D texture array, written as storage.
    Texture2DArray,
    /// A structured buffer.
    StructuredBuffer,
}

/// A descriptor table holding a single descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorRange {
    /// Access kind.
    pub kind: DescriptorRangeKind,
    /// Resource shape.
    pub dimension: RangeDimension,
}

impl DescriptorRange {
    /// A shader resource view range.
    pub fn srv(dimension: RangeDimension) -> Self {
        Self {
            kind: DescriptorRangeKind::Srv,
            dimension,
        }
    }

    /// An unordered access view range.
    pub fn uav(dimension: RangeDimension) -> Self {
        Self {
            kind: DescriptorRangeKind::Uav,
            dimension,
        }
    }

    /// Returns true if `view` can be bound to this range.
    pub fn accepts(&self, view: &ResourceView) -> bool {
        match (self.kind, self.dimension, view) {
            (DescriptorRangeKind::Srv, RangeDimension::Texture2D, ResourceView::TextureSrv { desc, .. }) => {
                desc.dimension == TextureViewDimension::D2
            }
            (DescriptorRangeKind::Srv, RangeDimension::TextureCube, ResourceView::TextureSrv { desc, .. }) => {
                desc.dimension == TextureViewDimension::Cube
            }
            (DescriptorRangeKind::Uav, RangeDimension::Texture2DArray, ResourceView::TextureUav { .. }) => true,
            (DescriptorRangeKind::Srv, RangeDimension::StructuredBuffer, ResourceView::BufferSrv { .. }) => true,
            (DescriptorRangeKind::Uav, RangeDimension::StructuredBuffer, ResourceView::BufferUav { .. }) => true,
            _ => false,
        }
    }
}

/// One root parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootParameter {
    /// Inline 32-bit constants.
    Constants {
        /// Number of 32-bit values.
        num_values: u32,
    },
    /// A descriptor table.
    DescriptorTable(DescriptorRange),
}

/// Descriptor for creating a root signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RootSignatureDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Root parameters in binding order.
    pub parameters: Vec<RootParameter>,
    /// Static samplers, bound after the parameters.
    pub static_samplers: Vec<StaticSampler>,
}

impl RootSignatureDescriptor {
    /// Create an empty root signature descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append a block of root constants.
    pub fn with_constants(mut self, num_values: u32) -> Self {
        self.parameters.push(RootParameter::Constants { num_values });
        self
    }

    /// Append a descriptor table.
    pub fn with_table(mut self, range: DescriptorRange) -> Self {
        self.parameters.push(RootParameter::DescriptorTable(range));
        self
    }

    /// Append a static sampler.
    pub fn with_static_sampler(mut self, sampler: StaticSampler) -> Self {
        self.static_samplers.push(sampler);
        self
    }

    /// Check parameter counts and constant sizes.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        if self.parameters.len() + self.static_samplers.len() > MAX_ROOT_PARAMETERS {
            return Err(GraphicsError::PipelineCreationFailed(format!(
                "root signature {:?} has {} bindings, at most {MAX_ROOT_PARAMETERS} allowed",
                self.label,
                self.parameters.len() + self.static_samplers.len()
            )));
        }
        let mut constant_blocks = 0;
        for parameter in &self.parameters {
            if let RootParameter::Constants { num_values } = parameter {
                constant_blocks += 1;
                if *num_values == 0 || *num_values > MAX_ROOT_CONSTANTS {
                    return Err(GraphicsError::PipelineCreationFailed(format!(
                        "root signature {:?} declares {num_values} root constants, 1..={MAX_ROOT_CONSTANTS} allowed",
                        self.label
                    )));
                }
            }
        }
        if constant_blocks > 1 {
            return Err(GraphicsError::PipelineCreationFailed(format!(
                "root signature {:?} declares {constant_blocks} constant blocks, at most one allowed",
                self.label
            )));
        }
        Ok(())
    }
}

/// A created root signature.
#[derive(Debug)]
pub struct RootSignature {
    descriptor: RootSignatureDescriptor,
    gpu: GpuRootSignature,
}

impl RootSignature {
    pub(crate) fn new(descriptor: RootSignatureDescriptor, gpu: GpuRootSignature) -> Self {
        Self { descriptor, gpu }
    }

    /// The descriptor the signature was created from.
    pub fn descriptor(&self) -> &RootSignatureDescriptor {
        &self.descriptor
    }

    /// Root parameters in binding order.
    pub fn parameters(&self) -> &[RootParameter] {
        &self.descriptor.parameters
    }

    /// Number of bindings a shader may reference (parameters plus samplers).
    pub fn binding_count(&self) -> u32 {
        (self.descriptor.parameters.len() + self.descriptor.static_samplers.len()) as u32
    }

    /// Index and size of the root constants parameter, if any.
    pub fn constants_parameter(&self) -> Option<(u32, u32)> {
        self.descriptor
            .parameters
            .iter()
            .enumerate()
            .find_map(|(index, parameter)| match parameter {
                RootParameter::Constants { num_values } => Some((index as u32, *num_values)),
                RootParameter::DescriptorTable(_) => None,
            })
    }

    /// Backend handle.
    pub(crate) fn gpu(&self) -> &GpuRootSignature {
        &self.gpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_validate() {
        let desc = RootSignatureDescriptor::new()
            .with_label("equi-to-cube")
            .with_constants(4)
            .with_table(DescriptorRange::srv(RangeDimension::Texture2D))
            .with_table(DescriptorRange::uav(RangeDimension::Texture2DArray))
            .with_static_sampler(StaticSampler::point_clamp());
        assert_eq!(desc.parameters.len(), 3);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn test_two_constant_blocks_rejected() {
        let desc = RootSignatureDescriptor::new().with_constants(4).with_constants(2);
        assert!(matches!(
            desc.validate(),
            Err(GraphicsError::PipelineCreationFailed(_))
        ));
    }

    #[test]
    fn test_constant_count_limits() {
        assert!(RootSignatureDescriptor::new().with_constants(0).validate().is_err());
        assert!(RootSignatureDescriptor::new().with_constants(65).validate().is_err());
        assert!(RootSignatureDescriptor::new().with_constants(64).validate().is_ok());
    }

    #[test]
    fn test_constants_parameter() {
        let signature = RootSignature::new(
            RootSignatureDescriptor::new()
                .with_table(DescriptorRange::srv(RangeDimension::StructuredBuffer))
                .with_constants(2),
            GpuRootSignature::Software,
        );
        assert_eq!(signature.constants_parameter(), Some((1, 2)));
        assert_eq!(signature.binding_count(), 2);
    }
}

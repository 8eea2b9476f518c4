//! Root signatures and compute pipelines of the probe stages.

use std::sync::Arc;

use super::constants::ROOT_CONSTANT_COUNT;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::pipeline::{
    ComputePipeline, ComputePipelineDescriptor, DescriptorRange, RangeDimension, RootSignature,
    RootSignatureDescriptor,
};
use crate::shader::ShaderLibrary;
use crate::types::StaticSampler;

/// The five compute shaders a probe runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeShader {
    /// Equirectangular image to one cube face and mip.
    EquiToCube,
    /// Per-texel SH projection of the environment cube.
    ShProject,
    /// One level of the SH tree reduction.
    ShReduce,
    /// Scale of the reduced coefficients by `4π / weight`.
    ShNormalize,
    /// Irradiance of one cube face from the coefficients.
    ShReconstruct,
}

impl ProbeShader {
    /// Every probe shader, in stage order.
    pub const ALL: [Self; 5] = [
        Self::EquiToCube,
        Self::ShProject,
        Self::ShReduce,
        Self::ShNormalize,
        Self::ShReconstruct,
    ];

    /// Shader file under `shaders/framework/`.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::EquiToCube => "equi-to-cube.cs.wgsl",
            Self::ShProject => "sh-project.cs.wgsl",
            Self::ShReduce => "sh-reduce.cs.wgsl",
            Self::ShNormalize => "sh-normalize.cs.wgsl",
            Self::ShReconstruct => "sh-reconstruct.cs.wgsl",
        }
    }

    /// Compute entry point.
    pub fn entry_point(&self) -> &'static str {
        match self {
            Self::EquiToCube => "equi_to_cube",
            Self::ShProject => "sh_project",
            Self::ShReduce => "sh_reduce",
            Self::ShNormalize => "sh_normalize",
            Self::ShReconstruct => "sh_reconstruct",
        }
    }

    /// Root signature layout. Parameter 0 is always the root constants.
    pub fn root_signature(&self) -> RootSignatureDescriptor {
        let descriptor = RootSignatureDescriptor::new()
            .with_label(self.entry_point())
            .with_constants(ROOT_CONSTANT_COUNT);
        match self {
            Self::EquiToCube => descriptor
                .with_table(DescriptorRange::srv(RangeDimension::Texture2D))
                .with_table(DescriptorRange::uav(RangeDimension::Texture2DArray)),
            Self::ShProject => descriptor
                .with_table(DescriptorRange::srv(RangeDimension::TextureCube))
                .with_table(DescriptorRange::uav(RangeDimension::StructuredBuffer))
                .with_table(DescriptorRange::uav(RangeDimension::StructuredBuffer))
                .with_static_sampler(StaticSampler::point_clamp()),
            Self::ShReduce => descriptor
                .with_table(DescriptorRange::uav(RangeDimension::StructuredBuffer))
                .with_table(DescriptorRange::uav(RangeDimension::StructuredBuffer)),
            Self::ShNormalize => descriptor
                .with_table(DescriptorRange::srv(RangeDimension::StructuredBuffer))
                .with_table(DescriptorRange::uav(RangeDimension::StructuredBuffer)),
            Self::ShReconstruct => descriptor
                .with_table(DescriptorRange::srv(RangeDimension::StructuredBuffer))
                .with_table(DescriptorRange::uav(RangeDimension::Texture2DArray)),
        }
    }
}

/// A root signature and the pipeline built on it.
#[derive(Debug, Clone)]
pub struct ProbePipeline {
    /// Root signature.
    pub root_signature: Arc<RootSignature>,
    /// Compute pipeline.
    pub pipeline: Arc<ComputePipeline>,
}

/// The five probe pipelines.
#[derive(Debug, Clone)]
pub struct IblPipelines {
    /// Equirect to cube.
    pub equi_to_cube: ProbePipeline,
    /// SH projection.
    pub sh_project: ProbePipeline,
    /// SH reduction.
    pub sh_reduce: ProbePipeline,
    /// SH normalization.
    pub sh_normalize: ProbePipeline,
    /// SH reconstruction.
    pub sh_reconstruct: ProbePipeline,
}

impl IblPipelines {
    /// Load, validate and build every probe pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first shader load, validation or pipeline creation error.
    pub fn new(device: &GraphicsDevice, library: &ShaderLibrary) -> Result<Self, GraphicsError> {
        let build = |shader: ProbeShader| -> Result<ProbePipeline, GraphicsError> {
            let blob = library.load_compute(shader.file_name(), shader.entry_point())?;
            let root_signature = device.create_root_signature(&shader.root_signature())?;
            let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(shader.entry_point()),
                root_signature: &root_signature,
                shader: &blob,
            })?;
            Ok(ProbePipeline {
                root_signature,
                pipeline,
            })
        };

        let pipelines = Self {
            equi_to_cube: build(ProbeShader::EquiToCube)?,
            sh_project: build(ProbeShader::ShProject)?,
            sh_reduce: build(ProbeShader::ShReduce)?,
            sh_normalize: build(ProbeShader::ShNormalize)?,
            sh_reconstruct: build(ProbeShader::ShReconstruct)?,
        };
        log::debug!("IblPipelines: built {} pipelines", ProbeShader::ALL.len());
        Ok(pipelines)
    }

    /// Pipeline of `shader`.
    pub fn get(&self, shader: ProbeShader) -> &ProbePipeline {
        match shader {
            ProbeShader::EquiToCube => &self.equi_to_cube,
            ProbeShader::ShProject => &self.sh_project,
            ProbeShader::ShReduce => &self.sh_reduce,
            ProbeShader::ShNormalize => &self.sh_normalize,
            ProbeShader::ShReconstruct => &self.sh_reconstruct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::FRAMEWORK_SHADERS;

    #[test]
    fn test_every_shader_is_built_in() {
        for shader in ProbeShader::ALL {
            assert!(
                FRAMEWORK_SHADERS.iter().any(|(name, _)| *name == shader.file_name()),
                "{} missing",
                shader.file_name()
            );
        }
    }

    #[test]
    fn test_shader_bindings_fit_root_signatures() {
        for shader in ProbeShader::ALL {
            let blob = ShaderLibrary::BuiltIn
                .load_compute(shader.file_name(), shader.entry_point())
                .unwrap();
            let descriptor = shader.root_signature();
            assert!(descriptor.validate().is_ok());
            let count = (descriptor.parameters.len() + descriptor.static_samplers.len()) as u32;
            assert!(blob.bindings().iter().all(|b| *b < count), "{shader:?}");
            assert_eq!(blob.bindings().len() as u32, count, "{shader:?}");
        }
    }
}

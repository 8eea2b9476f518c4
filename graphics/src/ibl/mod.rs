//! Image-based lighting: the reflection probe and its compute passes.
//!
//! A [`ReflectionProbe`] turns an equirectangular HDR image into an
//! environment cube map and a low-resolution irradiance cube map. The work is
//! recorded into a caller-supplied command list as five compute stages:
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌───────────┐   ┌──────────────┐   ┌────────────────┐
//! │ equi-to-cube │──▶│ sh-project │──▶│ sh-reduce │──▶│ sh-normalize │──▶│ sh-reconstruct │
//! │ mip × face   │   │ 1 dispatch │   │ N passes  │   │ 1 thread     │   │ 6 faces        │
//! └──────────────┘   └────────────┘   └───────────┘   └──────────────┘   └────────────────┘
//!   env cube (UAV)     coeff/weight      in place        final element      irradiance (UAV)
//! ```
//!
//! Stages are ordered by explicit barriers recorded between them.

mod constants;
mod layout;
mod pipelines;
mod probe;
mod sh;

pub use constants::{
    FaceConstants, NormalizeConstants, ProjectConstants, ROOT_CONSTANT_COUNT, ReconstructConstants,
    ReduceConstants,
};
pub use layout::{
    CUBE_FACE_COUNT, LINEAR_THREAD_COUNT, MAX_CUBE_EDGE, ReductionPass, SH_REDUCE_SEGMENT_SIZE, ShReductionPlan,
    THREAD_COUNT_X, THREAD_COUNT_Y, group_count,
};
pub use pipelines::{IblPipelines, ProbePipeline, ProbeShader};
pub use probe::ReflectionProbe;
pub use sh::{
    COSINE_LOBE, SH_COEFFICIENT_COUNT, ShCoefficients, band_lobe, cube_direction, cube_face_uv,
    equirect_uv, sh_basis, texel_solid_angle, texel_uv,
};

use crate::types::mip_level_count;

/// Probe resolution presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnvMapQuality {
    /// 512² environment, 32² irradiance.
    Low,
    /// 1024² environment, 64² irradiance.
    #[default]
    Mid,
    /// 2048² environment, 128² irradiance.
    High,
}

impl EnvMapQuality {
    /// Edge lengths of the preset.
    pub fn extent(&self) -> ProbeExtent {
        match self {
            Self::Low => ProbeExtent::new(512, 32),
            Self::Mid => ProbeExtent::new(1024, 64),
            Self::High => ProbeExtent::new(2048, 128),
        }
    }
}

impl std::str::FromStr for EnvMapQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "mid" | "medium" => Ok(Self::Mid),
            "high" => Ok(Self::High),
            other => Err(format!("unknown quality '{other}', expected low, mid or high")),
        }
    }
}

/// Edge lengths of a probe's cube maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeExtent {
    /// Edge of the environment cube, mip 0.
    pub env_edge: u32,
    /// Edge of the irradiance cube.
    pub irr_edge: u32,
}

impl ProbeExtent {
    /// Create an extent.
    pub fn new(env_edge: u32, irr_edge: u32) -> Self {
        Self { env_edge, irr_edge }
    }

    /// Mip levels of the environment cube.
    pub fn env_mip_count(&self) -> u32 {
        mip_level_count(self.env_edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_mip_counts() {
        assert_eq!(EnvMapQuality::Low.extent().env_mip_count(), 10);
        assert_eq!(EnvMapQuality::Mid.extent().env_mip_count(), 11);
        assert_eq!(EnvMapQuality::High.extent().env_mip_count(), 12);
    }

    #[test]
    fn test_quality_from_str() {
        assert_eq!("LOW".parse::<EnvMapQuality>(), Ok(EnvMapQuality::Low));
        assert_eq!("medium".parse::<EnvMapQuality>(), Ok(EnvMapQuality::Mid));
        assert!("ultra".parse::<EnvMapQuality>().is_err());
    }
}

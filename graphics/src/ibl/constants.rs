//! Root constant blocks of the probe pipelines.
//!
//! Every block is four 32-bit values so it also satisfies the 16-byte size
//! rule of WGSL uniform structs.

use bytemuck::{Pod, Zeroable};

/// Number of 32-bit root constants declared by every probe pipeline.
pub const ROOT_CONSTANT_COUNT: u32 = 4;

/// Equirect-to-cube constants: which face and mip is written.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FaceConstants {
    /// Cube face, `0..6`.
    pub face_index: u32,
    /// Destination mip level.
    pub mip_index: u32,
    /// Edge length of the destination mip.
    pub edge_length: u32,
    /// `1 / edge_length`.
    pub inv_edge_length: f32,
}

/// SH projection constants.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ProjectConstants {
    /// Edge length of environment mip 0.
    pub edge_length: u32,
    /// `1 / edge_length`.
    pub inv_edge_length: f32,
    /// Padding.
    pub _pad: [u32; 2],
}

/// SH reduction constants: the level being folded.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ReduceConstants {
    /// First element of the level.
    pub head_index: u32,
    /// One past the last element of the level.
    pub tail_index: u32,
    /// Padding.
    pub _pad: [u32; 2],
}

/// SH normalization constants.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct NormalizeConstants {
    /// Index of the fully reduced element.
    pub index: u32,
    /// Padding.
    pub _pad: [u32; 3],
}

/// SH reconstruction constants.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ReconstructConstants {
    /// Index of the normalized coefficients.
    pub coeff_index: u32,
    /// Cube face written.
    pub face_index: u32,
    /// Edge length of the irradiance cube.
    pub edge_length: u32,
    /// `1 / edge_length`.
    pub inv_edge_length: f32,
}

static_assertions::assert_eq_size!(FaceConstants, [u32; ROOT_CONSTANT_COUNT as usize]);
static_assertions::assert_eq_size!(ProjectConstants, [u32; ROOT_CONSTANT_COUNT as usize]);
static_assertions::assert_eq_size!(ReduceConstants, [u32; ROOT_CONSTANT_COUNT as usize]);
static_assertions::assert_eq_size!(NormalizeConstants, [u32; ROOT_CONSTANT_COUNT as usize]);
static_assertions::assert_eq_size!(ReconstructConstants, [u32; ROOT_CONSTANT_COUNT as usize]);

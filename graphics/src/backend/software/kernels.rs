//! Native versions of the framework compute shaders.
//!
//! Each kernel walks the dispatch grid group by group and thread by thread in
//! a fixed order, applying the same per-invocation body and bounds checks as
//! its WGSL counterpart.

use std::sync::Arc;

use glam::{Vec2, Vec4};

use super::memory::{SoftwareBuffer, SoftwareTexture};
use crate::backend::{GpuBuffer, GpuTexture};
use crate::descriptor::ResourceView;
use crate::error::GraphicsError;
use crate::ibl::{
    FaceConstants, NormalizeConstants, ProjectConstants, ReconstructConstants, ReduceConstants,
    ShCoefficients, cube_direction, cube_face_uv, equirect_uv, sh_basis, texel_solid_angle, texel_uv,
};
use crate::resources::{Buffer, Texture};
use crate::types::{BufferViewDesc, TextureSrvDesc, TextureUavDesc};

const FACE_COUNT: u32 = 6;
const REDUCE_SEGMENT: u32 = 4;
const FOUR_PI: f32 = 4.0 * std::f32::consts::PI;

/// A compute kernel the software backend can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SoftwareKernel {
    EquiToCube,
    ShProject,
    ShReduce,
    ShNormalize,
    ShReconstruct,
}

/// Inputs of one dispatch.
pub(crate) struct KernelDispatch<'a> {
    pub constants: &'a [u32],
    pub tables: &'a [Option<ResourceView>],
    pub groups: [u32; 3],
}

impl SoftwareKernel {
    /// Kernel implementing the WGSL entry point `name`.
    pub fn from_entry_point(name: &str) -> Option<Self> {
        match name {
            "equi_to_cube" => Some(Self::EquiToCube),
            "sh_project" => Some(Self::ShProject),
            "sh_reduce" => Some(Self::ShReduce),
            "sh_normalize" => Some(Self::ShNormalize),
            "sh_reconstruct" => Some(Self::ShReconstruct),
            _ => None,
        }
    }

    /// Workgroup size the kernel is written for.
    pub fn workgroup_size(&self) -> [u32; 3] {
        match self {
            Self::EquiToCube | Self::ShProject | Self::ShReconstruct => [8, 8, 1],
            Self::ShReduce => [64, 1, 1],
            Self::ShNormalize => [1, 1, 1],
        }
    }

    pub fn run(&self, dispatch: &KernelDispatch<'_>) -> Result<(), GraphicsError> {
        match self {
            Self::EquiToCube => equi_to_cube(dispatch),
            Self::ShProject => sh_project(dispatch),
            Self::ShReduce => sh_reduce(dispatch),
            Self::ShNormalize => sh_normalize(dispatch),
            Self::ShReconstruct => sh_reconstruct(dispatch),
        }
    }

    fn for_each_thread(&self, groups: [u32; 3], mut body: impl FnMut([u32; 3])) {
        let size = self.workgroup_size();
        for gz in 0..groups[2] {
            for gy in 0..groups[1] {
                for gx in 0..groups[0] {
                    for lz in 0..size[2] {
                        for ly in 0..size[1] {
                            for lx in 0..size[0] {
                                body([gx * size[0] + lx, gy * size[1] + ly, gz * size[2] + lz]);
                            }
                        }
                    }
                }
            }
        }
    }
}

fn read_constants<T: bytemuck::Pod>(dispatch: &KernelDispatch<'_>) -> Result<T, GraphicsError> {
    let bytes: &[u8] = bytemuck::cast_slice(dispatch.constants);
    bytes
        .get(..std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .ok_or_else(|| {
            GraphicsError::ExecutionFailed(format!(
                "kernel expects {} bytes of root constants, {} bound",
                std::mem::size_of::<T>(),
                bytes.len()
            ))
        })
}

fn binding<'a>(dispatch: &KernelDispatch<'a>, parameter: usize) -> Result<&'a ResourceView, GraphicsError> {
    dispatch
        .tables
        .get(parameter)
        .and_then(Option::as_ref)
        .ok_or_else(|| GraphicsError::ExecutionFailed(format!("root parameter {parameter} is not bound")))
}

pub(crate) fn software_texture(texture: &Texture) -> Result<&Arc<SoftwareTexture>, GraphicsError> {
    match texture.gpu() {
        GpuTexture::Software(texture) => Ok(texture),
        #[cfg(feature = "wgpu-backend")]
        GpuTexture::Wgpu(_) => Err(GraphicsError::InvalidParameter(format!(
            "texture {:?} belongs to another backend",
            texture.label()
        ))),
    }
}

pub(crate) fn software_buffer(buffer: &Buffer) -> Result<&Arc<SoftwareBuffer>, GraphicsError> {
    match buffer.gpu() {
        GpuBuffer::Software(buffer) => Ok(buffer),
        #[cfg(feature = "wgpu-backend")]
        GpuBuffer::Wgpu(_) => Err(GraphicsError::InvalidParameter(format!(
            "buffer {:?} belongs to another backend",
            buffer.label()
        ))),
    }
}

fn mismatch(parameter: usize, expected: &str, view: &ResourceView) -> GraphicsError {
    GraphicsError::ExecutionFailed(format!("root parameter {parameter} expects a {expected}, bound {view:?}"))
}

fn texture_srv<'a>(
    dispatch: &KernelDispatch<'a>,
    parameter: usize,
) -> Result<(&'a SoftwareTexture, TextureSrvDesc), GraphicsError> {
    match binding(dispatch, parameter)? {
        ResourceView::TextureSrv { texture, desc } => Ok((software_texture(texture)?, *desc)),
        other => Err(mismatch(parameter, "texture SRV", other)),
    }
}

fn texture_uav<'a>(
    dispatch: &KernelDispatch<'a>,
    parameter: usize,
) -> Result<(&'a SoftwareTexture, TextureUavDesc), GraphicsError> {
    match binding(dispatch, parameter)? {
        ResourceView::TextureUav { texture, desc } => Ok((software_texture(texture)?, *desc)),
        other => Err(mismatch(parameter, "texture UAV", other)),
    }
}

fn buffer_view<'a>(
    dispatch: &KernelDispatch<'a>,
    parameter: usize,
) -> Result<(&'a SoftwareBuffer, BufferViewDesc), GraphicsError> {
    match binding(dispatch, parameter)? {
        ResourceView::BufferSrv { buffer, desc } | ResourceView::BufferUav { buffer, desc } => {
            Ok((software_buffer(buffer)?, *desc))
        }
        other => Err(mismatch(parameter, "buffer view", other)),
    }
}

/// Word range of a structured view.
fn view_words(desc: &BufferViewDesc, words: usize) -> Result<std::ops::Range<usize>, GraphicsError> {
    let first = (desc.byte_offset() / 4) as usize;
    let last = first + (desc.byte_len() / 4) as usize;
    if desc.byte_offset() % 4 != 0 || last > words {
        return Err(GraphicsError::ExecutionFailed(format!(
            "structured view {desc:?} is not word aligned or exceeds the buffer"
        )));
    }
    Ok(first..last)
}

fn cast_failed(e: bytemuck::PodCastError) -> GraphicsError {
    GraphicsError::ExecutionFailed(format!("structured view does not match the element type: {e}"))
}

/// Bilinear fetch that wraps horizontally and clamps vertically.
fn sample_equirect(texels: &[[f32; 4]], width: u32, height: u32, uv: Vec2) -> Vec4 {
    let (w, h) = (width as i32, height as i32);
    let p = uv * Vec2::new(width as f32, height as f32) - 0.5;
    let cell = p.floor();
    let f = p - cell;
    let x0 = (cell.x as i32).rem_euclid(w);
    let x1 = (x0 + 1) % w;
    let y0 = (cell.y as i32).clamp(0, h - 1);
    let y1 = (cell.y as i32 + 1).clamp(0, h - 1);
    let load = |x: i32, y: i32| Vec4::from_array(texels[(y * w + x) as usize]);
    let top = load(x0, y0).lerp(load(x1, y0), f.x);
    let bottom = load(x0, y1).lerp(load(x1, y1), f.x);
    top.lerp(bottom, f.y)
}

fn store(texels: &mut [[f32; 4]], width: u32, height: u32, id: [u32; 3], color: Vec4) {
    if id[0] < width && id[1] < height {
        texels[(id[1] * width + id[0]) as usize] = color.to_array();
    }
}

fn equi_to_cube(dispatch: &KernelDispatch<'_>) -> Result<(), GraphicsError> {
    let constants: FaceConstants = read_constants(dispatch)?;
    let (source, srv) = texture_srv(dispatch, 1)?;
    let (target, uav) = texture_uav(dispatch, 2)?;

    let (src_width, src_height) = source.mip_size(srv.most_detailed_mip);
    let source_texels = source.subresource(srv.most_detailed_mip, 0)?.read();
    let (dst_width, dst_height) = target.mip_size(uav.mip_slice);
    let mut target_texels = target.subresource(uav.mip_slice, uav.first_array_slice)?.write();

    SoftwareKernel::EquiToCube.for_each_thread(dispatch.groups, |id| {
        if id[0] >= constants.edge_length || id[1] >= constants.edge_length {
            return;
        }
        let uv = texel_uv(id[0], id[1], constants.inv_edge_length);
        let dir = cube_direction(constants.face_index, uv);
        let color = sample_equirect(&source_texels, src_width, src_height, equirect_uv(dir));
        store(&mut target_texels, dst_width, dst_height, id, color);
    });
    Ok(())
}

fn sh_project(dispatch: &KernelDispatch<'_>) -> Result<(), GraphicsError> {
    let constants: ProjectConstants = read_constants(dispatch)?;
    let (env, srv) = texture_srv(dispatch, 1)?;
    let (coefficient_buffer, coefficient_view) = buffer_view(dispatch, 2)?;
    let (weight_buffer, weight_view) = buffer_view(dispatch, 3)?;

    let (width, height) = env.mip_size(srv.most_detailed_mip);
    let faces = (0..FACE_COUNT)
        .map(|face| env.subresource(srv.most_detailed_mip, face).map(|texels| texels.read()))
        .collect::<Result<Vec<_>, _>>()?;
    // Point sampling with clamp-to-edge addressing.
    let sample = |dir| {
        let (face, uv) = cube_face_uv(dir);
        let x = ((uv.x * width as f32) as u32).min(width - 1);
        let y = ((uv.y * height as f32) as u32).min(height - 1);
        Vec4::from_array(faces[face as usize][(y * width + x) as usize]).truncate()
    };

    let mut coefficient_words = coefficient_buffer.words().write();
    let range = view_words(&coefficient_view, coefficient_words.len())?;
    let coefficients: &mut [ShCoefficients] =
        bytemuck::try_cast_slice_mut(&mut coefficient_words[range]).map_err(cast_failed)?;
    let mut weight_words = weight_buffer.words().write();
    let range = view_words(&weight_view, weight_words.len())?;
    let weights: &mut [f32] = bytemuck::try_cast_slice_mut(&mut weight_words[range]).map_err(cast_failed)?;

    let edge = constants.edge_length;
    let inv = constants.inv_edge_length;
    SoftwareKernel::ShProject.for_each_thread(dispatch.groups, |id| {
        if id[0] >= edge || id[1] >= edge {
            return;
        }
        let uv = texel_uv(id[0], id[1], inv);
        let weight = texel_solid_angle(uv, inv);

        let mut acc = ShCoefficients::default();
        for face in 0..FACE_COUNT {
            let dir = cube_direction(face, uv);
            acc.add_sample(sample(dir), &sh_basis(dir), weight);
        }

        let index = (id[1] * edge + id[0]) as usize;
        if let Some(slot) = coefficients.get_mut(index) {
            *slot = acc;
        }
        if let Some(slot) = weights.get_mut(index) {
            *slot = 6.0 * weight;
        }
    });
    Ok(())
}

fn sh_reduce(dispatch: &KernelDispatch<'_>) -> Result<(), GraphicsError> {
    let constants: ReduceConstants = read_constants(dispatch)?;
    let (coefficient_buffer, coefficient_view) = buffer_view(dispatch, 1)?;
    let (weight_buffer, weight_view) = buffer_view(dispatch, 2)?;

    let mut coefficient_words = coefficient_buffer.words().write();
    let range = view_words(&coefficient_view, coefficient_words.len())?;
    let coefficients: &mut [ShCoefficients] =
        bytemuck::try_cast_slice_mut(&mut coefficient_words[range]).map_err(cast_failed)?;
    let mut weight_words = weight_buffer.words().write();
    let range = view_words(&weight_view, weight_words.len())?;
    let weights: &mut [f32] = bytemuck::try_cast_slice_mut(&mut weight_words[range]).map_err(cast_failed)?;

    SoftwareKernel::ShReduce.for_each_thread(dispatch.groups, |id| {
        let first = constants.head_index + id[0] * REDUCE_SEGMENT;
        if first >= constants.tail_index {
            return;
        }
        let last = (first + REDUCE_SEGMENT).min(constants.tail_index);

        let mut acc = ShCoefficients::default();
        let mut weight = 0.0;
        for i in first as usize..last as usize {
            if let (Some(c), Some(w)) = (coefficients.get(i), weights.get(i)) {
                acc.accumulate(c);
                weight += w;
            }
        }

        let dst = (constants.tail_index + id[0]) as usize;
        if let Some(slot) = coefficients.get_mut(dst) {
            *slot = acc;
        }
        if let Some(slot) = weights.get_mut(dst) {
            *slot = weight;
        }
    });
    Ok(())
}

fn sh_normalize(dispatch: &KernelDispatch<'_>) -> Result<(), GraphicsError> {
    let constants: NormalizeConstants = read_constants(dispatch)?;
    let (weight_buffer, weight_view) = buffer_view(dispatch, 1)?;
    let (coefficient_buffer, coefficient_view) = buffer_view(dispatch, 2)?;

    let weight_words = weight_buffer.words().read();
    let range = view_words(&weight_view, weight_words.len())?;
    let weights: &[f32] = bytemuck::try_cast_slice(&weight_words[range]).map_err(cast_failed)?;
    let mut coefficient_words = coefficient_buffer.words().write();
    let range = view_words(&coefficient_view, coefficient_words.len())?;
    let coefficients: &mut [ShCoefficients] =
        bytemuck::try_cast_slice_mut(&mut coefficient_words[range]).map_err(cast_failed)?;

    let index = constants.index as usize;
    SoftwareKernel::ShNormalize.for_each_thread(dispatch.groups, |_| {
        let weight = weights.get(index).copied().unwrap_or(0.0);
        let scale = if weight > 0.0 { FOUR_PI / weight } else { 0.0 };
        if let Some(slot) = coefficients.get_mut(index) {
            slot.scale(scale);
        }
    });
    Ok(())
}

fn sh_reconstruct(dispatch: &KernelDispatch<'_>) -> Result<(), GraphicsError> {
    let constants: ReconstructConstants = read_constants(dispatch)?;
    let (coefficient_buffer, coefficient_view) = buffer_view(dispatch, 1)?;
    let (target, uav) = texture_uav(dispatch, 2)?;

    let coefficient_words = coefficient_buffer.words().read();
    let range = view_words(&coefficient_view, coefficient_words.len())?;
    let coefficients: &[ShCoefficients] =
        bytemuck::try_cast_slice(&coefficient_words[range]).map_err(cast_failed)?;
    let sh = coefficients
        .get(constants.coeff_index as usize)
        .copied()
        .unwrap_or_default();

    let (width, height) = target.mip_size(uav.mip_slice);
    let mut texels = target.subresource(uav.mip_slice, uav.first_array_slice)?.write();

    SoftwareKernel::ShReconstruct.for_each_thread(dispatch.groups, |id| {
        if id[0] >= constants.edge_length || id[1] >= constants.edge_length {
            return;
        }
        let uv = texel_uv(id[0], id[1], constants.inv_edge_length);
        let dir = cube_direction(constants.face_index, uv);
        store(&mut texels, width, height, id, sh.irradiance(dir).extend(1.0));
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_points() {
        for (name, kernel) in [
            ("equi_to_cube", SoftwareKernel::EquiToCube),
            ("sh_project", SoftwareKernel::ShProject),
            ("sh_reduce", SoftwareKernel::ShReduce),
            ("sh_normalize", SoftwareKernel::ShNormalize),
            ("sh_reconstruct", SoftwareKernel::ShReconstruct),
        ] {
            assert_eq!(SoftwareKernel::from_entry_point(name), Some(kernel));
        }
        assert_eq!(SoftwareKernel::from_entry_point("main"), None);
    }

    #[test]
    fn test_thread_walk_covers_grid() {
        let mut visited = Vec::new();
        SoftwareKernel::ShReduce.for_each_thread([2, 1, 1], |id| visited.push(id[0]));
        assert_eq!(visited, (0..128).collect::<Vec<_>>());
    }

    #[test]
    fn test_sample_equirect_constant() {
        let texels = vec![[0.5, 0.25, 1.0, 1.0]; 8 * 4];
        for uv in [Vec2::ZERO, Vec2::new(0.99, 0.01), Vec2::new(0.5, 1.0)] {
            let color = sample_equirect(&texels, 8, 4, uv);
            assert!((color - Vec4::new(0.5, 0.25, 1.0, 1.0)).abs().max_element() < 1e-6);
        }
    }

    #[test]
    fn test_sample_equirect_wraps_horizontally() {
        // Left column 0, right column 1: sampling the seam blends the two.
        let mut texels = vec![[0.0; 4]; 4 * 2];
        for y in 0..2 {
            texels[y * 4 + 3] = [1.0; 4];
        }
        let seam = sample_equirect(&texels, 4, 2, Vec2::new(0.0, 0.25));
        assert!((seam.x - 0.5).abs() < 1e-6);
    }
}

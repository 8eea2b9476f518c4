//! Spherical harmonics and cube map geometry.
//!
//! Functions here mirror the WGSL in `shaders/framework/` term for term. The
//! software backend runs them as its kernels and tests use them as the CPU
//! reference.
//!
//! Cube faces follow the D3D/Vulkan order `+X, -X, +Y, -Y, +Z, -Z`, with the
//! texel `v` axis pointing down each face.

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Number of SH coefficients per color channel (bands 0 to 2).
pub const SH_COEFFICIENT_COUNT: usize = 9;

/// Cosine lobe convolution factors per band.
pub const COSINE_LOBE: [f32; 3] = [PI, 2.0 * PI / 3.0, PI / 4.0];

/// Nine RGB coefficients as stored in the coefficient buffer.
///
/// Each coefficient occupies a `vec4<f32>` so the layout matches
/// `array<vec4<f32>, 9>` in WGSL; the fourth lane is unused.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct ShCoefficients {
    /// Coefficients in basis order, RGB in `xyz`.
    pub coefficients: [[f32; 4]; SH_COEFFICIENT_COUNT],
}

static_assertions::assert_eq_size!(ShCoefficients, [f32; 36]);

impl ShCoefficients {
    /// Byte stride of one element in the coefficient buffer.
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    /// Accumulate `color * basis[k] * weight` into every coefficient.
    pub fn add_sample(&mut self, color: Vec3, basis: &[f32; SH_COEFFICIENT_COUNT], weight: f32) {
        for (coefficient, b) in self.coefficients.iter_mut().zip(basis) {
            let value = Vec4::from_array(*coefficient) + (color * (*b * weight)).extend(0.0);
            *coefficient = value.to_array();
        }
    }

    /// Add another set coefficient by coefficient.
    pub fn accumulate(&mut self, other: &Self) {
        for (a, b) in self.coefficients.iter_mut().zip(&other.coefficients) {
            *a = (Vec4::from_array(*a) + Vec4::from_array(*b)).to_array();
        }
    }

    /// Multiply every coefficient by `factor`.
    pub fn scale(&mut self, factor: f32) {
        for coefficient in self.coefficients.iter_mut() {
            *coefficient = (Vec4::from_array(*coefficient) * factor).to_array();
        }
    }

    /// RGB value of coefficient `index`.
    pub fn rgb(&self, index: usize) -> Vec3 {
        Vec4::from_array(self.coefficients[index]).truncate()
    }

    /// Irradiance around `normal` divided by pi, clamped to non-negative.
    ///
    /// For a uniform environment of radiance `L` this returns `L`.
    pub fn irradiance(&self, normal: Vec3) -> Vec3 {
        let basis = sh_basis(normal);
        let mut sum = Vec3::ZERO;
        for (k, b) in basis.iter().enumerate() {
            sum += self.rgb(k) * (b * band_lobe(k));
        }
        (sum / PI).max(Vec3::ZERO)
    }
}

/// Cosine lobe factor of coefficient `k`.
pub fn band_lobe(k: usize) -> f32 {
    match k {
        0 => COSINE_LOBE[0],
        1..=3 => COSINE_LOBE[1],
        _ => COSINE_LOBE[2],
    }
}

/// Real SH basis functions of bands 0 to 2 evaluated at a unit direction.
pub fn sh_basis(n: Vec3) -> [f32; SH_COEFFICIENT_COUNT] {
    [
        0.282_095,
        0.488_603 * n.y,
        0.488_603 * n.z,
        0.488_603 * n.x,
        1.092_548 * n.x * n.y,
        1.092_548 * n.y * n.z,
        0.315_392 * (3.0 * n.z * n.z - 1.0),
        1.092_548 * n.x * n.z,
        0.546_274 * (n.x * n.x - n.y * n.y),
    ]
}

/// Unit direction through face coordinates `uv` in `[0, 1]²` of cube face `face`.
pub fn cube_direction(face: u32, uv: Vec2) -> Vec3 {
    let s = uv.x * 2.0 - 1.0;
    let t = uv.y * 2.0 - 1.0;
    let dir = match face {
        0 => Vec3::new(1.0, -t, -s),
        1 => Vec3::new(-1.0, -t, s),
        2 => Vec3::new(s, 1.0, t),
        3 => Vec3::new(s, -1.0, -t),
        4 => Vec3::new(s, -t, 1.0),
        _ => Vec3::new(-s, -t, -1.0),
    };
    dir.normalize()
}

/// Face coordinates of the center of texel `(x, y)` on a face of `edge` texels.
pub fn texel_uv(x: u32, y: u32, inv_edge: f32) -> Vec2 {
    (Vec2::new(x as f32, y as f32) + 0.5) * inv_edge
}

/// Solid angle subtended by the texel whose center is at `uv`.
pub fn texel_solid_angle(uv: Vec2, inv_edge: f32) -> f32 {
    let st = uv * 2.0 - 1.0;
    let r2 = 1.0 + st.dot(st);
    4.0 * inv_edge * inv_edge / (r2 * r2.sqrt())
}

/// Equirectangular coordinates in `[0, 1]²` of a unit direction; `+Y` maps to the top row.
pub fn equirect_uv(dir: Vec3) -> Vec2 {
    let u = dir.z.atan2(dir.x) / (2.0 * PI) + 0.5;
    let v = dir.y.clamp(-1.0, 1.0).acos() / PI;
    Vec2::new(u, v)
}

/// Cube face and face coordinates hit by a direction.
pub fn cube_face_uv(dir: Vec3) -> (u32, Vec2) {
    let a = dir.abs();
    let (face, sc, tc, ma) = if a.x >= a.y && a.x >= a.z {
        if dir.x > 0.0 {
            (0, -dir.z, -dir.y, a.x)
        } else {
            (1, dir.z, -dir.y, a.x)
        }
    } else if a.y >= a.z {
        if dir.y > 0.0 {
            (2, dir.x, dir.z, a.y)
        } else {
            (3, dir.x, -dir.z, a.y)
        }
    } else if dir.z > 0.0 {
        (4, dir.x, -dir.y, a.z)
    } else {
        (5, -dir.x, -dir.y, a.z)
    };
    (face, Vec2::new(sc / ma + 1.0, tc / ma + 1.0) * 0.5)
}

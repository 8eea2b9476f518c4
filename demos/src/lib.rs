//! # Skylight Demos
//!
//! Helpers shared by the demo binaries.
//!
//! ## Available Demos
//!
//! - `bake_probe` - Bake a reflection probe from an HDR panorama and write the irradiance faces

use std::path::Path;

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// An equirectangular RGBA32F image, row-major, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct EquirectImage {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[f32; 4]>,
}

impl EquirectImage {
    /// Load a Radiance HDR file.
    pub fn load_hdr(path: &Path) -> Result<Self, String> {
        log::info!("Loading HDR panorama from {}", path.display());
        let img = image::open(path).map_err(|e| format!("Failed to decode {}: {e}", path.display()))?;
        let rgba32f = img.to_rgba32f();
        let (width, height) = rgba32f.dimensions();
        log::info!("HDR image: {}x{}", width, height);

        let texels = rgba32f
            .into_raw()
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();
        Ok(Self { width, height, texels })
    }

    /// A procedural sky: a horizon gradient, a dim ground and a small sun.
    pub fn synthetic_sky(height: u32) -> Self {
        let height = height.max(1);
        let width = 2 * height;
        let sun = [0.3f32, 0.8, 0.5];
        let sun_len = (sun[0] * sun[0] + sun[1] * sun[1] + sun[2] * sun[2]).sqrt();

        let mut texels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            let theta = (y as f32 + 0.5) / height as f32 * std::f32::consts::PI;
            for x in 0..width {
                let phi = ((x as f32 + 0.5) / width as f32 - 0.5) * 2.0 * std::f32::consts::PI;
                let dir = [theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()];
                let up = dir[1];
                let color = if up >= 0.0 {
                    let t = up.sqrt();
                    [0.6 - 0.4 * t, 0.7 - 0.3 * t, 0.9 + 0.3 * t]
                } else {
                    [0.15, 0.12, 0.1]
                };
                let cos_sun = (dir[0] * sun[0] + dir[1] * sun[1] + dir[2] * sun[2]) / sun_len;
                let glow = if cos_sun > 0.995 { 50.0 } else { 0.0 };
                texels.push([color[0] + glow, color[1] + glow, color[2] + 0.9 * glow, 1.0]);
            }
        }
        Self { width, height, texels }
    }

    /// Returns true if the image is twice as wide as it is tall.
    pub fn is_two_by_one(&self) -> bool {
        self.height > 0 && self.width == 2 * self.height
    }

    /// Bilinearly resample to `2h x h`, keeping the height.
    ///
    /// Horizontal lookups wrap around the seam; vertical ones clamp.
    pub fn to_two_by_one(&self) -> Self {
        if self.is_two_by_one() || self.width == 0 || self.height == 0 {
            return self.clone();
        }
        let height = self.height;
        let width = 2 * height;
        log::info!(
            "Resampling {}x{} panorama to {}x{}",
            self.width,
            self.height,
            width,
            height
        );

        let (w, h) = (self.width as i64, self.height as i64);
        let load = |x: i64, y: i64| self.texels[(y.clamp(0, h - 1) * w + x.rem_euclid(w)) as usize];
        let mut texels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            let sy = (y as f32 + 0.5) * self.height as f32 / height as f32 - 0.5;
            let y0 = sy.floor();
            let fy = sy - y0;
            for x in 0..width {
                let sx = (x as f32 + 0.5) * self.width as f32 / width as f32 - 0.5;
                let x0 = sx.floor();
                let fx = sx - x0;
                let (x0, y0) = (x0 as i64, y0 as i64);
                let (a, b, c, d) = (load(x0, y0), load(x0 + 1, y0), load(x0, y0 + 1), load(x0 + 1, y0 + 1));
                let mut texel = [0.0; 4];
                for i in 0..4 {
                    let top = a[i] + (b[i] - a[i]) * fx;
                    let bottom = c[i] + (d[i] - c[i]) * fx;
                    texel[i] = top + (bottom - top) * fy;
                }
                texels.push(texel);
            }
        }
        Self { width, height, texels }
    }
}

/// Write a square RGBA32F face as a Radiance HDR file, dropping alpha.
pub fn save_face_hdr(path: &Path, edge: u32, texels: &[[f32; 4]]) -> Result<(), String> {
    let rgb: Vec<f32> = texels.iter().flat_map(|t| [t[0], t[1], t[2]]).collect();
    let img = image::Rgb32FImage::from_raw(edge, edge, rgb)
        .ok_or_else(|| format!("face of {} texels is not {edge}x{edge}", texels.len()))?;
    image::DynamicImage::ImageRgb32F(img)
        .save_with_format(path, image::ImageFormat::Hdr)
        .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}

/// File name suffixes of the six cube faces.
pub const FACE_NAMES: [&str; 6] = ["px", "nx", "py", "ny", "pz", "nz"];

//! Common types shared across the graphics system.

/// 3D extent (width, height, depth or array layers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth in pixels, or array layer count for 2D array textures.
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Size of the given mip level (never smaller than one texel).
    pub fn mip_level_size(&self, mip: u32) -> Self {
        Self {
            width: (self.width >> mip).max(1),
            height: (self.height >> mip).max(1),
            depth: self.depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_size() {
        let extent = Extent3d::new_3d(64, 32, 6);
        assert_eq!(extent.mip_level_size(0), extent);
        assert_eq!(extent.mip_level_size(1), Extent3d::new_3d(32, 16, 6));
        assert_eq!(extent.mip_level_size(6), Extent3d::new_3d(1, 1, 6));
        assert_eq!(extent.mip_level_size(10), Extent3d::new_3d(1, 1, 6));
    }
}

//! Texture types and descriptors.

use bitflags::bitflags;

use super::Extent3d;
use crate::error::GraphicsError;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 32-bit red channel, float.
    R32Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
}

impl TextureFormat {
    /// Returns the size in bytes per pixel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R32Float | Self::Rgba8Unorm => 4,
            Self::Rgba32Float => 16,
        }
    }

    /// Returns true if the format can be bound as a storage texture by every backend.
    pub fn supports_storage(&self) -> bool {
        matches!(self, Self::R32Float | Self::Rgba32Float)
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from.
        const COPY_SRC = 1 << 0;
        /// Texture can be copied to.
        const COPY_DST = 1 << 1;
        /// Texture can be read through a shader resource view.
        const TEXTURE_BINDING = 1 << 2;
        /// Texture can be written through an unordered access view.
        const STORAGE_BINDING = 1 << 3;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Number of levels in a full mip chain for the given edge length.
///
/// This is `floor(log2(edge)) + 1`, and zero for a zero edge.
pub fn mip_level_count(edge: u32) -> u32 {
    u32::BITS - edge.leading_zeros()
}

/// Descriptor for creating a 2D (array) texture.
///
/// `size.depth` holds the array layer count. Cube maps are six-layer arrays.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Size of the texture; `depth` is the array layer count.
    pub size: Extent3d,
    /// Mip level count.
    pub mip_level_count: u32,
    /// Texture format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent3d::new_2d(width, height),
            mip_level_count: 1,
            format,
            usage,
        }
    }

    /// Create a new cube map descriptor (a six-layer 2D array).
    pub fn new_cube(edge: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent3d::new_3d(edge, edge, 6),
            mip_level_count: 1,
            format,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// Number of array layers.
    pub fn array_layers(&self) -> u32 {
        self.size.depth
    }

    /// Returns true if the texture can back a cube view.
    pub fn is_cube_compatible(&self) -> bool {
        self.size.depth == 6 && self.size.width == self.size.height
    }

    /// Total number of subresources (mips times layers).
    pub fn subresource_count(&self) -> u32 {
        self.mip_level_count * self.array_layers()
    }

    /// Flat subresource index, mip-minor: `mip + layer * mip_level_count`.
    pub fn subresource_index(&self, mip: u32, layer: u32) -> u32 {
        mip + layer * self.mip_level_count
    }

    /// Check the descriptor for zero sizes and an over-long mip chain.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        if self.size.width == 0 || self.size.height == 0 || self.size.depth == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} has a zero dimension ({}x{}x{})",
                self.label, self.size.width, self.size.height, self.size.depth
            )));
        }
        let max_mips = mip_level_count(self.size.width.max(self.size.height));
        if self.mip_level_count == 0 || self.mip_level_count > max_mips {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} requests {} mips, at most {max_mips} allowed",
                self.label, self.mip_level_count
            )));
        }
        if self.usage.contains(TextureUsage::STORAGE_BINDING) && !self.format.supports_storage() {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} format {:?} cannot be used for storage",
                self.label, self.format
            )));
        }
        Ok(())
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            size: Extent3d::new_2d(1, 1),
            mip_level_count: 1,
            format: TextureFormat::default(),
            usage: TextureUsage::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(0), 0);
        assert_eq!(mip_level_count(1), 1);
        assert_eq!(mip_level_count(2), 2);
        assert_eq!(mip_level_count(3), 2);
        assert_eq!(mip_level_count(512), 10);
        assert_eq!(mip_level_count(1024), 11);
        assert_eq!(mip_level_count(2048), 12);
    }

    #[test]
    fn test_subresource_index() {
        let desc = TextureDescriptor::new_cube(
            16,
            TextureFormat::Rgba32Float,
            TextureUsage::TEXTURE_BINDING,
        )
        .with_mip_levels(5);
        assert_eq!(desc.subresource_count(), 30);
        assert_eq!(desc.subresource_index(0, 0), 0);
        assert_eq!(desc.subresource_index(4, 0), 4);
        assert_eq!(desc.subresource_index(0, 1), 5);
        assert_eq!(desc.subresource_index(2, 5), 27);
    }

    #[test]
    fn test_validate() {
        let desc = TextureDescriptor::new_2d(
            64,
            32,
            TextureFormat::Rgba32Float,
            TextureUsage::STORAGE_BINDING,
        );
        assert!(desc.validate().is_ok());
        assert!(desc.clone().with_mip_levels(7).validate().is_ok());
        assert!(desc.clone().with_mip_levels(8).validate().is_err());

        let zero = TextureDescriptor::new_2d(0, 32, TextureFormat::Rgba32Float, TextureUsage::empty());
        assert!(zero.validate().is_err());

        let storage_rgba8 = TextureDescriptor::new_2d(
            4,
            4,
            TextureFormat::Rgba8Unorm,
            TextureUsage::STORAGE_BINDING,
        );
        assert!(storage_rgba8.validate().is_err());
    }
}

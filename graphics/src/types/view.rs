//! View descriptors written into descriptor heap slots.

use super::{BufferDescriptor, BufferUsage, TextureDescriptor, TextureFormat, TextureUsage};
use crate::error::GraphicsError;

/// How a shader sees a texture view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewDimension {
    /// A single 2D image.
    D2,
    /// A cube map built from six array layers.
    Cube,
    /// A range of 2D array layers.
    D2Array,
}

/// Shader resource view of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureSrvDesc {
    /// View dimension, `D2` or `Cube`.
    pub dimension: TextureViewDimension,
    /// First visible mip level.
    pub most_detailed_mip: u32,
    /// Number of visible mip levels.
    pub mip_levels: u32,
}

impl TextureSrvDesc {
    /// A 2D view over the first `mip_levels` mips.
    pub fn texture_2d(mip_levels: u32) -> Self {
        Self {
            dimension: TextureViewDimension::D2,
            most_detailed_mip: 0,
            mip_levels,
        }
    }

    /// A cube view over the first `mip_levels` mips.
    pub fn cube(mip_levels: u32) -> Self {
        Self {
            dimension: TextureViewDimension::Cube,
            most_detailed_mip: 0,
            mip_levels,
        }
    }

    /// Check the view against the texture it targets.
    pub fn validate(&self, texture: &TextureDescriptor) -> Result<(), GraphicsError> {
        if !texture.usage.contains(TextureUsage::TEXTURE_BINDING) {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} lacks TEXTURE_BINDING usage for a shader resource view",
                texture.label
            )));
        }
        check_mip_range(texture, self.most_detailed_mip, self.mip_levels)?;
        match self.dimension {
            TextureViewDimension::D2 if texture.array_layers() != 1 => {
                Err(GraphicsError::InvalidParameter(format!(
                    "2D view of texture {:?} with {} layers",
                    texture.label,
                    texture.array_layers()
                )))
            }
            TextureViewDimension::Cube if !texture.is_cube_compatible() => {
                Err(GraphicsError::InvalidParameter(format!(
                    "cube view of texture {:?} which is not a square six-layer array",
                    texture.label
                )))
            }
            TextureViewDimension::D2Array => Err(GraphicsError::FeatureNotSupported(
                "2D array shader resource views".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Unordered access view of one mip of a range of texture array layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUavDesc {
    /// Mip level written by the view.
    pub mip_slice: u32,
    /// First array layer.
    pub first_array_slice: u32,
    /// Number of array layers.
    pub array_size: u32,
}

impl TextureUavDesc {
    /// A view of a single cube face at the given mip.
    pub fn face(face: u32, mip: u32) -> Self {
        Self {
            mip_slice: mip,
            first_array_slice: face,
            array_size: 1,
        }
    }

    /// Check the view against the texture it targets.
    pub fn validate(&self, texture: &TextureDescriptor) -> Result<(), GraphicsError> {
        if !texture.usage.contains(TextureUsage::STORAGE_BINDING) {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} lacks STORAGE_BINDING usage for an unordered access view",
                texture.label
            )));
        }
        if texture.format != TextureFormat::Rgba32Float {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "unordered access views of {:?}",
                texture.format
            )));
        }
        check_mip_range(texture, self.mip_slice, 1)?;
        let end = self.first_array_slice.checked_add(self.array_size);
        if self.array_size == 0 || end.is_none_or(|end| end > texture.array_layers()) {
            return Err(GraphicsError::InvalidParameter(format!(
                "layers {}..+{} out of range for texture {:?} with {} layers",
                self.first_array_slice,
                self.array_size,
                texture.label,
                texture.array_layers()
            )));
        }
        Ok(())
    }
}

/// Structured buffer view, used for both SRVs and UAVs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferViewDesc {
    /// First visible element.
    pub first_element: u64,
    /// Number of visible elements.
    pub num_elements: u32,
    /// Element stride in bytes.
    pub structure_byte_stride: u32,
}

impl BufferViewDesc {
    /// A view over every element of a structured buffer.
    pub fn whole(buffer: &BufferDescriptor) -> Self {
        Self {
            first_element: 0,
            num_elements: u32::try_from(buffer.element_count()).unwrap_or(u32::MAX),
            structure_byte_stride: buffer.stride,
        }
    }

    /// Byte offset of the first element.
    pub fn byte_offset(&self) -> u64 {
        self.first_element * u64::from(self.structure_byte_stride)
    }

    /// Byte length of the view.
    pub fn byte_len(&self) -> u64 {
        u64::from(self.num_elements) * u64::from(self.structure_byte_stride)
    }

    /// Check the view against the buffer it targets.
    pub fn validate(&self, buffer: &BufferDescriptor) -> Result<(), GraphicsError> {
        if !buffer.usage.contains(BufferUsage::STORAGE) {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {:?} lacks STORAGE usage for a structured view",
                buffer.label
            )));
        }
        if self.structure_byte_stride == 0 || self.num_elements == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "empty structured view of buffer {:?}",
                buffer.label
            )));
        }
        if self.byte_offset() + self.byte_len() > buffer.size {
            return Err(GraphicsError::InvalidParameter(format!(
                "view of {} elements at {} exceeds buffer {:?} of {} bytes",
                self.num_elements, self.first_element, buffer.label, buffer.size
            )));
        }
        Ok(())
    }
}

fn check_mip_range(texture: &TextureDescriptor, first: u32, count: u32) -> Result<(), GraphicsError> {
    let end = first.checked_add(count);
    if count == 0 || end.is_none_or(|end| end > texture.mip_level_count) {
        return Err(GraphicsError::InvalidParameter(format!(
            "mips {first}..+{count} out of range for texture {:?} with {} mips",
            texture.label, texture.mip_level_count
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> TextureDescriptor {
        TextureDescriptor::new_cube(
            32,
            TextureFormat::Rgba32Float,
            TextureUsage::TEXTURE_BINDING | TextureUsage::STORAGE_BINDING,
        )
        .with_mip_levels(6)
    }

    #[test]
    fn test_cube_srv() {
        assert!(TextureSrvDesc::cube(6).validate(&cube()).is_ok());
        assert!(TextureSrvDesc::cube(7).validate(&cube()).is_err());
        assert!(TextureSrvDesc::texture_2d(1).validate(&cube()).is_err());
    }

    #[test]
    fn test_face_uav() {
        assert!(TextureUavDesc::face(5, 5).validate(&cube()).is_ok());
        assert!(TextureUavDesc::face(6, 0).validate(&cube()).is_err());
        assert!(TextureUavDesc::face(0, 6).validate(&cube()).is_err());
    }

    #[test]
    fn test_buffer_view() {
        let buffer = BufferDescriptor::structured(8, 16, BufferUsage::STORAGE);
        let view = BufferViewDesc::whole(&buffer);
        assert_eq!(view.num_elements, 8);
        assert_eq!(view.byte_len(), 128);
        assert!(view.validate(&buffer).is_ok());

        let past_end = BufferViewDesc {
            first_element: 4,
            ..view
        };
        assert!(past_end.validate(&buffer).is_err());
    }
}

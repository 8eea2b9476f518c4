//! GPU texture resource.

use crate::backend::GpuTexture;
use crate::resources::ResourceId;
use crate::types::{Extent3d, TextureDescriptor, TextureFormat};

/// A GPU texture resource.
///
/// Textures are created by [`GraphicsDevice::create_texture`] in an explicit
/// initial [`ResourceState`] and are reference-counted.
///
/// # Example
///
/// ```ignore
/// let texture = device.create_texture(
///     &TextureDescriptor::new_cube(64, TextureFormat::Rgba32Float, usage),
///     ResourceState::ShaderResource,
/// )?;
/// println!("Cube edge: {}", texture.width());
/// ```
///
/// [`GraphicsDevice::create_texture`]: crate::GraphicsDevice::create_texture
/// [`ResourceState`]: crate::types::ResourceState
pub struct Texture {
    id: ResourceId,
    descriptor: TextureDescriptor,
    gpu: GpuTexture,
}

impl Texture {
    /// Create a new texture (called by GraphicsDevice).
    pub(crate) fn new(descriptor: TextureDescriptor, gpu: GpuTexture) -> Self {
        Self {
            id: ResourceId::next(),
            descriptor,
            gpu,
        }
    }

    /// Unique identifier.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Backend handle.
    pub(crate) fn gpu(&self) -> &GpuTexture {
        &self.gpu
    }

    /// Get the texture size.
    pub fn size(&self) -> Extent3d {
        self.descriptor.size
    }

    /// Get the texture width.
    pub fn width(&self) -> u32 {
        self.descriptor.size.width
    }

    /// Get the texture height.
    pub fn height(&self) -> u32 {
        self.descriptor.size.height
    }

    /// Get the array layer count.
    pub fn array_layers(&self) -> u32 {
        self.descriptor.array_layers()
    }

    /// Get the texture format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    /// Get the mip level count.
    pub fn mip_level_count(&self) -> u32 {
        self.descriptor.mip_level_count
    }

    /// Get the texture label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id.raw())
            .field("size", &self.descriptor.size)
            .field("mips", &self.descriptor.mip_level_count)
            .field("format", &self.descriptor.format)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

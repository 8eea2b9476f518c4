//! Sampled 2D texture with its own shader resource view.

use std::sync::Arc;

use super::Texture;
use crate::descriptor::{Descriptor, OwnedDescriptors, ResourceView, SharedDescriptorAllocator};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::{ResourceState, TextureDescriptor, TextureFormat, TextureSrvDesc, TextureUsage};

/// An uploaded 2D texture and the SRV that exposes it to shaders.
///
/// The texture is left in `ShaderResource`. Its SRV slot returns to the
/// allocator when the `Texture2D` is dropped.
///
/// # Example
///
/// ```ignore
/// let sky = Texture2D::from_texels(&device, &allocator, 256, 128, &texels, Some("sky"))?;
/// assert_eq!(sky.width(), 2 * sky.height());
/// ```
#[derive(Debug)]
pub struct Texture2D {
    texture: Arc<Texture>,
    srv: Descriptor,
    _descriptors: OwnedDescriptors,
}

impl Texture2D {
    /// Upload RGBA32F texels, row-major.
    pub fn from_texels(
        device: &GraphicsDevice,
        allocator: &SharedDescriptorAllocator,
        width: u32,
        height: u32,
        texels: &[[f32; 4]],
        label: Option<&str>,
    ) -> Result<Self, GraphicsError> {
        Self::upload(
            device,
            allocator,
            width,
            height,
            TextureFormat::Rgba32Float,
            bytemuck::cast_slice(texels),
            label,
        )
    }

    /// Upload 8-bit RGBA texels, row-major.
    pub fn from_rgba8(
        device: &GraphicsDevice,
        allocator: &SharedDescriptorAllocator,
        width: u32,
        height: u32,
        bytes: &[u8],
        label: Option<&str>,
    ) -> Result<Self, GraphicsError> {
        Self::upload(
            device,
            allocator,
            width,
            height,
            TextureFormat::Rgba8Unorm,
            bytes,
            label,
        )
    }

    fn upload(
        device: &GraphicsDevice,
        allocator: &SharedDescriptorAllocator,
        width: u32,
        height: u32,
        format: TextureFormat,
        data: &[u8],
        label: Option<&str>,
    ) -> Result<Self, GraphicsError> {
        let mut descriptor = TextureDescriptor::new_2d(
            width,
            height,
            format,
            TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST | TextureUsage::COPY_SRC,
        );
        descriptor.label = label.map(str::to_owned);

        let texture = device.create_texture(&descriptor, ResourceState::ShaderResource)?;
        device.write_texture(&texture, 0, 0, data)?;

        let mut descriptors = OwnedDescriptors::new(Arc::clone(allocator));
        let srv = descriptors.allocate()?;
        allocator.lock().heap().write_view(
            &srv,
            ResourceView::TextureSrv {
                texture: Arc::clone(&texture),
                desc: TextureSrvDesc::texture_2d(1),
            },
        )?;

        log::trace!("Texture2D {label:?}: {width}x{height} {format:?}, SRV slot {}", srv.index);
        Ok(Self {
            texture,
            srv,
            _descriptors: descriptors,
        })
    }

    /// The texture.
    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    /// Shader resource view descriptor.
    pub fn srv(&self) -> Descriptor {
        self.srv
    }

    /// Width in texels.
    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    /// Height in texels.
    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    /// Texel format.
    pub fn format(&self) -> TextureFormat {
        self.texture.format()
    }
}

//! Host memory behind software textures and buffers, with state tracking.

use std::collections::BTreeSet;

use parking_lot::{Mutex, RwLock};

use crate::error::GraphicsError;
use crate::types::{BufferDescriptor, ResourceState, TextureDescriptor, TextureFormat};

/// Tracked state of one resource.
///
/// `pending_writes` holds the subresources written through a UAV since the
/// last barrier on the resource. Buffers use subresource 0.
#[derive(Debug)]
pub(crate) struct StateTracker {
    label: Option<String>,
    state: ResourceState,
    pending_writes: BTreeSet<u32>,
}

impl StateTracker {
    fn new(label: Option<String>, state: ResourceState) -> Self {
        Self {
            label,
            state,
            pending_writes: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn transition(&mut self, before: ResourceState, after: ResourceState) -> Result<(), GraphicsError> {
        if self.state != before {
            return Err(GraphicsError::InvalidResourceState(format!(
                "transition of {:?} from {before} to {after}, but it is in {}",
                self.label, self.state
            )));
        }
        self.state = after;
        self.pending_writes.clear();
        Ok(())
    }

    pub fn uav_barrier(&mut self) {
        self.pending_writes.clear();
    }

    /// Check that the resource is in `required` and none of `subresources` has
    /// an unsynchronized UAV write.
    pub fn check_access(
        &self,
        required: ResourceState,
        subresources: &[u32],
        access: &str,
    ) -> Result<(), GraphicsError> {
        if self.state != required {
            return Err(GraphicsError::InvalidResourceState(format!(
                "{access} of {:?} requires {required}, but it is in {}",
                self.label, self.state
            )));
        }
        if let Some(subresource) = subresources.iter().find(|s| self.pending_writes.contains(s)) {
            return Err(GraphicsError::Hazard(format!(
                "{access} of {:?} subresource {subresource} without a barrier after its last UAV write",
                self.label
            )));
        }
        Ok(())
    }

    pub fn mark_written(&mut self, subresources: &[u32]) {
        self.pending_writes.extend(subresources.iter().copied());
    }
}

/// Texture storage: one RGBA32F texel vector per subresource.
#[derive(Debug)]
pub(crate) struct SoftwareTexture {
    descriptor: TextureDescriptor,
    subresources: Vec<RwLock<Vec<[f32; 4]>>>,
    tracker: Mutex<StateTracker>,
}

impl SoftwareTexture {
    pub fn new(descriptor: &TextureDescriptor, initial_state: ResourceState) -> Self {
        let mut subresources = Vec::with_capacity(descriptor.subresource_count() as usize);
        for _layer in 0..descriptor.array_layers() {
            for mip in 0..descriptor.mip_level_count {
                let size = descriptor.size.mip_level_size(mip);
                let texels = size.width as usize * size.height as usize;
                subresources.push(RwLock::new(vec![[0.0; 4]; texels]));
            }
        }
        Self {
            descriptor: descriptor.clone(),
            subresources,
            tracker: Mutex::new(StateTracker::new(descriptor.label.clone(), initial_state)),
        }
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn tracker(&self) -> &Mutex<StateTracker> {
        &self.tracker
    }

    /// Width and height of mip `mip`.
    pub fn mip_size(&self, mip: u32) -> (u32, u32) {
        let size = self.descriptor.size.mip_level_size(mip);
        (size.width, size.height)
    }

    pub fn subresource(&self, mip: u32, layer: u32) -> Result<&RwLock<Vec<[f32; 4]>>, GraphicsError> {
        if mip >= self.descriptor.mip_level_count || layer >= self.descriptor.array_layers() {
            return Err(GraphicsError::InvalidParameter(format!(
                "subresource (mip {mip}, layer {layer}) out of range for texture {:?}",
                self.descriptor.label
            )));
        }
        let index = self.descriptor.subresource_index(mip, layer) as usize;
        self.subresources.get(index).ok_or_else(|| {
            GraphicsError::Internal(format!("missing subresource {index} of {:?}", self.descriptor.label))
        })
    }

    /// Upload packed texels in the texture's format.
    pub fn write(&self, mip: u32, layer: u32, data: &[u8]) -> Result<(), GraphicsError> {
        let (width, height) = self.mip_size(mip);
        let expected = width as usize * height as usize * self.descriptor.format.block_size() as usize;
        if data.len() != expected {
            return Err(GraphicsError::InvalidParameter(format!(
                "upload of {} bytes to {width}x{height} {:?} subresource, expected {expected}",
                data.len(),
                self.descriptor.format
            )));
        }
        let texels = decode_texels(self.descriptor.format, data);
        *self.subresource(mip, layer)?.write() = texels;
        Ok(())
    }

    /// Read packed texels in the texture's format.
    pub fn read(&self, mip: u32, layer: u32) -> Result<Vec<u8>, GraphicsError> {
        let texels = self.subresource(mip, layer)?.read();
        Ok(encode_texels(self.descriptor.format, &texels))
    }
}

fn decode_texels(format: TextureFormat, data: &[u8]) -> Vec<[f32; 4]> {
    match format {
        TextureFormat::Rgba32Float => bytemuck::pod_collect_to_vec(data),
        TextureFormat::Rgba8Unorm => data
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]].map(|v| f32::from(v) / 255.0))
            .collect(),
        TextureFormat::R32Float => data
            .chunks_exact(4)
            .map(|c| [f32::from_ne_bytes([c[0], c[1], c[2], c[3]]), 0.0, 0.0, 1.0])
            .collect(),
    }
}

fn encode_texels(format: TextureFormat, texels: &[[f32; 4]]) -> Vec<u8> {
    match format {
        TextureFormat::Rgba32Float => bytemuck::cast_slice(texels).to_vec(),
        TextureFormat::Rgba8Unorm => texels
            .iter()
            .flat_map(|texel| texel.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect(),
        TextureFormat::R32Float => texels.iter().flat_map(|texel| texel[0].to_ne_bytes()).collect(),
    }
}

/// Buffer storage, kept as 32-bit words so structured views cast in place.
#[derive(Debug)]
pub(crate) struct SoftwareBuffer {
    size: u64,
    words: RwLock<Vec<u32>>,
    tracker: Mutex<StateTracker>,
}

impl SoftwareBuffer {
    pub fn new(descriptor: &BufferDescriptor, initial_state: ResourceState) -> Self {
        Self {
            size: descriptor.size,
            words: RwLock::new(vec![0; (descriptor.size / 4) as usize]),
            tracker: Mutex::new(StateTracker::new(descriptor.label.clone(), initial_state)),
        }
    }

    pub fn tracker(&self) -> &Mutex<StateTracker> {
        &self.tracker
    }

    pub fn words(&self) -> &RwLock<Vec<u32>> {
        &self.words
    }

    pub fn write(&self, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        let end = offset.checked_add(data.len() as u64).filter(|end| *end <= self.size);
        let Some(end) = end else {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at {offset} exceeds buffer of {} bytes",
                data.len(),
                self.size
            )));
        };
        let mut words = self.words.write();
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(words.as_mut_slice());
        bytes[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    pub fn read(&self) -> Vec<u8> {
        bytemuck::cast_slice(self.words.read().as_slice()).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferUsage, TextureUsage};

    #[test]
    fn test_texture_subresource_sizes() {
        let descriptor = TextureDescriptor::new_cube(8, TextureFormat::Rgba32Float, TextureUsage::STORAGE_BINDING)
            .with_mip_levels(4);
        let texture = SoftwareTexture::new(&descriptor, ResourceState::Common);
        assert_eq!(texture.subresource(0, 0).unwrap().read().len(), 64);
        assert_eq!(texture.subresource(3, 5).unwrap().read().len(), 1);
        assert!(texture.subresource(4, 0).is_err());
        assert!(texture.subresource(0, 6).is_err());
    }

    #[test]
    fn test_rgba8_upload_is_normalized() {
        let descriptor = TextureDescriptor::new_2d(2, 1, TextureFormat::Rgba8Unorm, TextureUsage::COPY_DST);
        let texture = SoftwareTexture::new(&descriptor, ResourceState::Common);
        texture.write(0, 0, &[255, 0, 51, 255, 0, 0, 0, 0]).unwrap();
        let texels = texture.subresource(0, 0).unwrap().read().clone();
        assert_eq!(texels[0], [1.0, 0.0, 0.2, 1.0]);
        assert_eq!(texture.read(0, 0).unwrap(), vec![255, 0, 51, 255, 0, 0, 0, 0]);
    }

    #[test]
    fn test_upload_size_checked() {
        let descriptor = TextureDescriptor::new_2d(2, 2, TextureFormat::Rgba32Float, TextureUsage::COPY_DST);
        let texture = SoftwareTexture::new(&descriptor, ResourceState::Common);
        assert!(texture.write(0, 0, &[0; 16]).is_err());
        assert!(texture.write(0, 0, &[0; 64]).is_ok());
    }

    #[test]
    fn test_buffer_write_read() {
        let descriptor = BufferDescriptor::new(16, BufferUsage::STORAGE);
        let buffer = SoftwareBuffer::new(&descriptor, ResourceState::UnorderedAccess);
        buffer.write(4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(&buffer.read()[4..8], &[1, 2, 3, 4]);
        assert!(buffer.write(14, &[0; 4]).is_err());
    }

    #[test]
    fn test_tracker_transition_and_hazard() {
        let mut tracker = StateTracker::new(None, ResourceState::ShaderResource);
        assert!(matches!(
            tracker.transition(ResourceState::UnorderedAccess, ResourceState::ShaderResource),
            Err(GraphicsError::InvalidResourceState(_))
        ));
        tracker
            .transition(ResourceState::ShaderResource, ResourceState::UnorderedAccess)
            .unwrap();
        tracker.mark_written(&[3]);
        assert!(tracker.check_access(ResourceState::UnorderedAccess, &[2], "UAV").is_ok());
        assert!(matches!(
            tracker.check_access(ResourceState::UnorderedAccess, &[3], "UAV"),
            Err(GraphicsError::Hazard(_))
        ));
        tracker.uav_barrier();
        assert!(tracker.check_access(ResourceState::UnorderedAccess, &[3], "UAV").is_ok());
        assert!(matches!(
            tracker.check_access(ResourceState::ShaderResource, &[0], "SRV"),
            Err(GraphicsError::InvalidResourceState(_))
        ));
    }
}

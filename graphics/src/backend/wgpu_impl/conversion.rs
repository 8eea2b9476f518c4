//! Type conversions between Skylight types and wgpu types.

use std::num::NonZeroU64;

use crate::pipeline::{DescriptorRangeKind, RangeDimension, RootParameter};
use crate::types::{
    AddressMode, BufferUsage, FilterMode, StaticSampler, TextureFormat, TextureUsage, TextureViewDimension,
};

/// Convert BufferUsage flags to wgpu buffer usages.
pub fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
    let mut result = wgpu::BufferUsages::empty();

    if usage.contains(BufferUsage::UNIFORM) {
        result |= wgpu::BufferUsages::UNIFORM;
    }
    if usage.contains(BufferUsage::STORAGE) {
        result |= wgpu::BufferUsages::STORAGE;
    }
    if usage.contains(BufferUsage::COPY_SRC) {
        result |= wgpu::BufferUsages::COPY_SRC;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        result |= wgpu::BufferUsages::COPY_DST;
    }

    result
}

/// Convert TextureUsage flags to wgpu texture usages.
pub fn convert_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
    let mut result = wgpu::TextureUsages::empty();

    if usage.contains(TextureUsage::COPY_SRC) {
        result |= wgpu::TextureUsages::COPY_SRC;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        result |= wgpu::TextureUsages::COPY_DST;
    }
    if usage.contains(TextureUsage::TEXTURE_BINDING) {
        result |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.contains(TextureUsage::STORAGE_BINDING) {
        result |= wgpu::TextureUsages::STORAGE_BINDING;
    }

    result
}

/// Convert TextureFormat to wgpu format.
pub fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

/// Convert a view dimension to its wgpu counterpart.
pub fn convert_view_dimension(dimension: TextureViewDimension) -> wgpu::TextureViewDimension {
    match dimension {
        TextureViewDimension::D2 => wgpu::TextureViewDimension::D2,
        TextureViewDimension::Cube => wgpu::TextureViewDimension::Cube,
        TextureViewDimension::D2Array => wgpu::TextureViewDimension::D2Array,
    }
}

/// Convert AddressMode to wgpu address mode.
pub fn convert_address_mode(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

/// Convert FilterMode to wgpu filter mode.
pub fn convert_filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

/// Sampler descriptor for a static sampler.
pub fn convert_static_sampler(sampler: &StaticSampler) -> wgpu::SamplerDescriptor<'static> {
    wgpu::SamplerDescriptor {
        label: Some("Static Sampler"),
        address_mode_u: convert_address_mode(sampler.address_u),
        address_mode_v: convert_address_mode(sampler.address_v),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: convert_filter_mode(sampler.filter),
        min_filter: convert_filter_mode(sampler.filter),
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    }
}

/// Size in bytes of a root constants block as a WGSL uniform struct.
pub fn constants_binding_size(num_values: u32) -> u64 {
    u64::from(num_values.div_ceil(4) * 16)
}

/// Bind group layout entry for a root parameter bound at `binding`.
pub fn convert_root_parameter(binding: u32, parameter: &RootParameter) -> wgpu::BindGroupLayoutEntry {
    let ty = match parameter {
        RootParameter::Constants { num_values } => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: NonZeroU64::new(constants_binding_size(*num_values)),
        },
        RootParameter::DescriptorTable(range) => match (range.kind, range.dimension) {
            (DescriptorRangeKind::Srv, RangeDimension::Texture2D) => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            (DescriptorRangeKind::Srv, RangeDimension::TextureCube) => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::Cube,
                multisampled: false,
            },
            (DescriptorRangeKind::Srv, RangeDimension::Texture2DArray) => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2Array,
                multisampled: false,
            },
            // UAVs always address single-mip array slices.
            (
                DescriptorRangeKind::Uav,
                RangeDimension::Texture2D | RangeDimension::Texture2DArray | RangeDimension::TextureCube,
            ) => wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: wgpu::TextureFormat::Rgba32Float,
                view_dimension: wgpu::TextureViewDimension::D2Array,
            },
            (kind, RangeDimension::StructuredBuffer) => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage {
                    read_only: kind == DescriptorRangeKind::Srv,
                },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        },
    };

    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty,
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::DescriptorRange;

    #[test]
    fn test_constants_binding_size() {
        assert_eq!(constants_binding_size(1), 16);
        assert_eq!(constants_binding_size(4), 16);
        assert_eq!(constants_binding_size(5), 32);
    }

    #[test]
    fn test_structured_buffer_access() {
        let srv = convert_root_parameter(
            1,
            &RootParameter::DescriptorTable(DescriptorRange::srv(RangeDimension::StructuredBuffer)),
        );
        assert!(matches!(
            srv.ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                ..
            }
        ));
        let uav = convert_root_parameter(
            2,
            &RootParameter::DescriptorTable(DescriptorRange::uav(RangeDimension::StructuredBuffer)),
        );
        assert!(matches!(
            uav.ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                ..
            }
        ));
        assert_eq!(uav.binding, 2);
    }

    #[test]
    fn test_texture_usage_conversion() {
        let usage = convert_texture_usage(TextureUsage::TEXTURE_BINDING | TextureUsage::STORAGE_BINDING);
        assert!(usage.contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(usage.contains(wgpu::TextureUsages::STORAGE_BINDING));
        assert!(!usage.contains(wgpu::TextureUsages::COPY_SRC));
    }
}

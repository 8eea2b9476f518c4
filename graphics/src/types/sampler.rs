//! Sampler types.
//!
//! Samplers are never allocated from a descriptor heap. They are baked into
//! the root signature as static samplers.

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Point sampling.
    #[default]
    Nearest,
    /// Bilinear filtering.
    Linear,
}

/// Texture coordinate addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Clamp coordinates to the edge texel.
    #[default]
    ClampToEdge,
    /// Wrap coordinates around.
    Repeat,
}

/// A sampler baked into a root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StaticSampler {
    /// Magnification, minification and mip filter.
    pub filter: FilterMode,
    /// Address mode for U.
    pub address_u: AddressMode,
    /// Address mode for V.
    pub address_v: AddressMode,
}

impl StaticSampler {
    /// A point sampler clamping on both axes.
    pub fn point_clamp() -> Self {
        Self::default()
    }

    /// Set the filter mode.
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    /// Set the address modes.
    pub fn with_address(mut self, u: AddressMode, v: AddressMode) -> Self {
        self.address_u = u;
        self.address_v = v;
        self
    }
}

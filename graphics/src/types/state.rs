//! Resource states used by transition barriers.

/// The access state a resource is in on the GPU timeline.
///
/// Textures and buffers are created in an explicit initial state and must be
/// moved between states with transition barriers before their usage changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// No particular access. Allowed for copies on every backend.
    #[default]
    Common,
    /// Read through a shader resource view.
    ShaderResource,
    /// Read and written through an unordered access view.
    UnorderedAccess,
    /// Source of a copy.
    CopySource,
    /// Destination of a copy.
    CopyDest,
}

impl ResourceState {
    /// Short lowercase name used in log and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::ShaderResource => "shader-resource",
            Self::UnorderedAccess => "unordered-access",
            Self::CopySource => "copy-source",
            Self::CopyDest => "copy-dest",
        }
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

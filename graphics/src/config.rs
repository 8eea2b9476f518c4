//! Device configuration.

use std::time::Duration;

use crate::backend::BackendKind;
use crate::shader::ShaderLibrary;

/// Default number of slots in a device's descriptor heaps.
pub const DEFAULT_DESCRIPTOR_HEAP_CAPACITY: u32 = 4096;

/// Default timeout of [`GpuSync::wait`](crate::scheduler::GpuSync::wait).
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration consumed by [`GraphicsDevice::new`](crate::GraphicsDevice::new).
///
/// # Example
///
/// ```ignore
/// let config = GraphicsConfig::new()
///     .with_backend(BackendKind::Software)
///     .with_shader_library(ShaderLibrary::from_directory("graphics/shaders"))
///     .with_label("bake");
/// let device = GraphicsDevice::new(&config)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsConfig {
    /// Backend to run on.
    pub backend: BackendKind,
    /// Where compute shaders are loaded from.
    pub shader_library: ShaderLibrary,
    /// Slots in descriptor heaps created with the default capacity.
    pub descriptor_heap_capacity: u32,
    /// Timeout of `GpuSync::wait`; `None` waits forever.
    pub wait_timeout: Option<Duration>,
    /// Debug label of the device.
    pub label: Option<String>,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            shader_library: ShaderLibrary::default(),
            descriptor_heap_capacity: DEFAULT_DESCRIPTOR_HEAP_CAPACITY,
            wait_timeout: Some(DEFAULT_WAIT_TIMEOUT),
            label: None,
        }
    }
}

impl GraphicsConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the shader library.
    pub fn with_shader_library(mut self, library: ShaderLibrary) -> Self {
        self.shader_library = library;
        self
    }

    /// Set the default descriptor heap capacity.
    pub fn with_descriptor_heap_capacity(mut self, capacity: u32) -> Self {
        self.descriptor_heap_capacity = capacity;
        self
    }

    /// Set the default wait timeout.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GraphicsConfig::default();
        assert_eq!(config.backend, BackendKind::Auto);
        assert_eq!(config.shader_library, ShaderLibrary::BuiltIn);
        assert_eq!(config.descriptor_heap_capacity, 4096);
        assert_eq!(config.wait_timeout, Some(Duration::from_secs(10)));
        assert!(config.label.is_none());
    }

    #[test]
    fn test_builder() {
        let config = GraphicsConfig::new()
            .with_backend(BackendKind::Software)
            .with_shader_library(ShaderLibrary::from_directory("shaders"))
            .with_descriptor_heap_capacity(64)
            .with_wait_timeout(None)
            .with_label("test");
        assert_eq!(config.backend, BackendKind::Software);
        assert_eq!(config.shader_library, ShaderLibrary::Directory("shaders".into()));
        assert_eq!(config.descriptor_heap_capacity, 64);
        assert_eq!(config.wait_timeout, None);
        assert_eq!(config.label.as_deref(), Some("test"));
    }
}

//! Shader library: built-in sources or a directory on disk.

use std::path::{Path, PathBuf};

use super::ShaderBlob;
use crate::error::GraphicsError;

/// Subdirectory holding the reflection-probe shaders.
const FRAMEWORK_DIR: &str = "framework";

// =============================================================================
// Built-in shader sources (loaded from files at compile time)
// =============================================================================

/// File names and sources of the built-in framework shaders.
pub const FRAMEWORK_SHADERS: [(&str, &str); 5] = [
    (
        "equi-to-cube.cs.wgsl",
        include_str!("../../shaders/framework/equi-to-cube.cs.wgsl"),
    ),
    (
        "sh-project.cs.wgsl",
        include_str!("../../shaders/framework/sh-project.cs.wgsl"),
    ),
    (
        "sh-reduce.cs.wgsl",
        include_str!("../../shaders/framework/sh-reduce.cs.wgsl"),
    ),
    (
        "sh-normalize.cs.wgsl",
        include_str!("../../shaders/framework/sh-normalize.cs.wgsl"),
    ),
    (
        "sh-reconstruct.cs.wgsl",
        include_str!("../../shaders/framework/sh-reconstruct.cs.wgsl"),
    ),
];

/// Where compute shaders are loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderLibrary {
    /// Sources compiled into the crate.
    BuiltIn,
    /// Sources read from `<root>/framework/` at load time.
    Directory(PathBuf),
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::BuiltIn
    }
}

impl ShaderLibrary {
    /// A library reading shaders from `root`.
    pub fn from_directory(root: impl Into<PathBuf>) -> Self {
        Self::Directory(root.into())
    }

    /// Path a framework shader is read from, if the library is disk backed.
    pub fn framework_path(&self, file_name: &str) -> Option<PathBuf> {
        match self {
            Self::BuiltIn => None,
            Self::Directory(root) => Some(root.join(FRAMEWORK_DIR).join(file_name)),
        }
    }

    /// Load and validate a framework compute shader.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::ShaderLoadFailed`] when the file cannot be read
    /// and [`GraphicsError::ShaderCompilationFailed`] when it does not validate.
    pub fn load_compute(&self, file_name: &str, entry_point: &str) -> Result<ShaderBlob, GraphicsError> {
        match self {
            Self::BuiltIn => {
                let (_, source) = FRAMEWORK_SHADERS
                    .iter()
                    .find(|(name, _)| *name == file_name)
                    .ok_or_else(|| GraphicsError::ShaderLoadFailed {
                        path: Path::new(FRAMEWORK_DIR).join(file_name),
                        reason: "not a built-in shader".into(),
                    })?;
                ShaderBlob::from_wgsl(file_name, source, entry_point)
            }
            Self::Directory(root) => {
                let path = root.join(FRAMEWORK_DIR).join(file_name);
                let source = std::fs::read_to_string(&path).map_err(|e| {
                    log::error!("ShaderLibrary: cannot read {}: {e}", path.display());
                    GraphicsError::ShaderLoadFailed {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                log::debug!("ShaderLibrary: loaded {}", path.display());
                ShaderBlob::from_wgsl(file_name, &source, entry_point)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_in_shaders_validate() {
        let library = ShaderLibrary::BuiltIn;
        let entries = [
            ("equi-to-cube.cs.wgsl", "equi_to_cube"),
            ("sh-project.cs.wgsl", "sh_project"),
            ("sh-reduce.cs.wgsl", "sh_reduce"),
            ("sh-normalize.cs.wgsl", "sh_normalize"),
            ("sh-reconstruct.cs.wgsl", "sh_reconstruct"),
        ];
        for (file, entry) in entries {
            let blob = library.load_compute(file, entry).unwrap();
            assert_eq!(blob.entry_point(), entry);
        }
    }

    #[test]
    fn test_directory_library_reads_disk() {
        let library = ShaderLibrary::from_directory(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders"));
        let blob = library.load_compute("sh-reduce.cs.wgsl", "sh_reduce").unwrap();
        assert_eq!(blob.name(), "sh-reduce.cs.wgsl");
    }

    #[test]
    fn test_missing_file() {
        let library = ShaderLibrary::from_directory("/nonexistent/shader/root");
        let err = library.load_compute("sh-reduce.cs.wgsl", "sh_reduce").unwrap_err();
        assert!(matches!(err, GraphicsError::ShaderLoadFailed { .. }));

        let err = ShaderLibrary::BuiltIn
            .load_compute("missing.cs.wgsl", "main")
            .unwrap_err();
        assert!(matches!(err, GraphicsError::ShaderLoadFailed { .. }));
    }
}

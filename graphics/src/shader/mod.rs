//! Compute shader loading and validation.
//!
//! Shaders are written in WGSL. Every blob is parsed and validated with naga
//! when it is loaded, so a broken file is reported at pipeline build time with
//! the parser's diagnostics instead of surfacing later as a driver error.
//!
//! The reflection-probe shaders live in `shaders/framework/`:
//!
//! | File | Entry point |
//! |------|-------------|
//! | `equi-to-cube.cs.wgsl` | `equi_to_cube` |
//! | `sh-project.cs.wgsl` | `sh_project` |
//! | `sh-reduce.cs.wgsl` | `sh_reduce` |
//! | `sh-normalize.cs.wgsl` | `sh_normalize` |
//! | `sh-reconstruct.cs.wgsl` | `sh_reconstruct` |

mod library;

pub use library::{FRAMEWORK_SHADERS, ShaderLibrary};

use std::sync::Arc;

use crate::error::GraphicsError;

/// A validated compute shader.
#[derive(Debug, Clone)]
pub struct ShaderBlob {
    name: String,
    source: Arc<str>,
    entry_point: String,
    workgroup_size: [u32; 3],
    bindings: Vec<u32>,
}

impl ShaderBlob {
    /// Parse and validate WGSL source and locate its compute entry point.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::ShaderCompilationFailed`] if the source does not
    /// parse or validate, declares bindings outside group 0, or lacks a compute
    /// entry point named `entry_point`.
    pub fn from_wgsl(name: &str, source: &str, entry_point: &str) -> Result<Self, GraphicsError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| {
            GraphicsError::ShaderCompilationFailed(format!(
                "{name}: WGSL parse error: {}",
                e.emit_to_string(source)
            ))
        })?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator.validate(&module).map_err(|e| {
            GraphicsError::ShaderCompilationFailed(format!(
                "{name}: validation error: {e}"
            ))
        })?;

        let entry = module
            .entry_points
            .iter()
            .find(|ep| ep.name == entry_point && ep.stage == naga::ShaderStage::Compute)
            .ok_or_else(|| {
                GraphicsError::ShaderCompilationFailed(format!(
                    "{name}: compute entry point '{entry_point}' not found"
                ))
            })?;

        let mut bindings = Vec::new();
        for (_, variable) in module.global_variables.iter() {
            if let Some(binding) = &variable.binding {
                if binding.group != 0 {
                    return Err(GraphicsError::ShaderCompilationFailed(format!(
                        "{name}: binding {} uses group {}, only group 0 is supported",
                        binding.binding, binding.group
                    )));
                }
                bindings.push(binding.binding);
            }
        }
        bindings.sort_unstable();

        log::trace!(
            "ShaderBlob: validated {name} ({entry_point}, workgroup {:?}, bindings {bindings:?})",
            entry.workgroup_size
        );

        Ok(Self {
            name: name.to_owned(),
            source: Arc::from(source),
            entry_point: entry_point.to_owned(),
            workgroup_size: entry.workgroup_size,
            bindings,
        })
    }

    /// Name the blob was loaded under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// WGSL source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compute entry point.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Threads per workgroup declared by the entry point.
    pub fn workgroup_size(&self) -> [u32; 3] {
        self.workgroup_size
    }

    /// Binding numbers of group 0 declared by the module, sorted.
    pub fn bindings(&self) -> &[u32] {
        &self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
@group(0) @binding(1) var<storage, read_write> data: array<f32>;

@compute @workgroup_size(64, 1, 1)
fn double_values(@builtin(global_invocation_id) id: vec3<u32>) {
    if id.x < arrayLength(&data) {
        data[id.x] = data[id.x] * 2.0;
    }
}
"#;

    #[test]
    fn test_valid_shader() {
        let blob = ShaderBlob::from_wgsl("double", SOURCE, "double_values").unwrap();
        assert_eq!(blob.entry_point(), "double_values");
        assert_eq!(blob.workgroup_size(), [64, 1, 1]);
        assert_eq!(blob.bindings(), &[1]);
    }

    #[test]
    fn test_missing_entry_point() {
        let err = ShaderBlob::from_wgsl("double", SOURCE, "main").unwrap_err();
        assert!(matches!(err, GraphicsError::ShaderCompilationFailed(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = ShaderBlob::from_wgsl("broken", "fn oops( {", "oops").unwrap_err();
        assert!(matches!(err, GraphicsError::ShaderCompilationFailed(_)));
    }

    #[test]
    fn test_non_zero_group_rejected() {
        let source = SOURCE.replace("@group(0)", "@group(1)");
        assert!(ShaderBlob::from_wgsl("grouped", &source, "double_values").is_err());
    }
}

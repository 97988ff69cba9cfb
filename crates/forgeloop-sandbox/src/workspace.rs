use std::fs;
use std::path::{Component, Path};

use forgeloop_core::{Bundle, SandboxError};

/// File name the build descriptor is written to inside the workspace
pub const BUILD_DESCRIPTOR_FILE: &str = "Dockerfile";

/// Write a bundle into a directory: the build descriptor as `Dockerfile` at
/// the root, every bundle file at its relative path with parent directories
/// created as needed.
///
/// Paths must stay inside the workspace; absolute paths and `..` components
/// are rejected.
pub fn materialize_bundle(root: &Path, bundle: &Bundle) -> Result<(), SandboxError> {
    write_file(root, BUILD_DESCRIPTOR_FILE, &bundle.build_descriptor)?;

    for file in &bundle.files {
        check_relative(&file.path)?;
        write_file(root, &file.path, &file.content)?;
    }
    Ok(())
}

fn check_relative(path: &str) -> Result<(), SandboxError> {
    if path.is_empty() {
        return Err(SandboxError::Workspace("empty file path".to_string()));
    }
    let parsed = Path::new(path);
    if parsed.is_absolute() {
        return Err(SandboxError::Workspace(format!(
            "absolute file path not allowed: {}",
            path
        )));
    }
    for component in parsed.components() {
        if matches!(component, Component::ParentDir) {
            return Err(SandboxError::Workspace(format!(
                "file path escapes workspace: {}",
                path
            )));
        }
    }
    Ok(())
}

fn write_file(root: &Path, rel_path: &str, content: &str) -> Result<(), SandboxError> {
    let target = root.join(rel_path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| SandboxError::Workspace(format!("{}: {}", rel_path, e)))?;
    }
    fs::write(&target, content)
        .map_err(|e| SandboxError::Workspace(format!("{}: {}", rel_path, e)))
}

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single named file carried inside a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleFile {
    /// Path relative to the bundle root (e.g. `src/main.py`)
    pub path: String,
    /// Full file content
    pub content: String,
}

impl BundleFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// The full artifact state carried across rounds: a build recipe plus the
/// named files that go with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Build/runtime recipe (a Dockerfile for the docker backend)
    pub build_descriptor: String,
    /// All other source/config/documentation content, paths unique
    #[serde(default)]
    pub files: Vec<BundleFile>,
}

/// Structural problems with a bundle or patch
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("build descriptor is empty")]
    EmptyBuildDescriptor,

    #[error("duplicate file path: {0}")]
    DuplicatePath(String),
}

impl Bundle {
    pub fn new(build_descriptor: impl Into<String>, files: Vec<BundleFile>) -> Self {
        Self {
            build_descriptor: build_descriptor.into(),
            files,
        }
    }

    /// A bundle is complete when the build descriptor is non-empty and file
    /// paths are unique. Propose must hand the controller a complete bundle.
    pub fn validate(&self) -> Result<(), BundleError> {
        if self.build_descriptor.trim().is_empty() {
            return Err(BundleError::EmptyBuildDescriptor);
        }
        check_unique_paths(&self.files)
    }

    /// Field-wise override of this bundle by a patch. A present field replaces
    /// the whole field; an absent field keeps the current value. Pure and
    /// total: the patch must already be validated, merge itself cannot fail.
    pub fn merge(&self, patch: &Patch) -> Bundle {
        Bundle {
            build_descriptor: patch
                .build_descriptor
                .clone()
                .unwrap_or_else(|| self.build_descriptor.clone()),
            files: patch.files.clone().unwrap_or_else(|| self.files.clone()),
        }
    }
}

/// A partial update to a bundle returned by the judge.
///
/// Each field is present-with-value or absent. `Some(vec![])` for `files` is
/// an explicit instruction to clear all files and is not the same as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_descriptor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<BundleFile>>,
}

impl Patch {
    /// True when the patch touches neither field
    pub fn is_noop(&self) -> bool {
        self.build_descriptor.is_none() && self.files.is_none()
    }

    /// Reject structurally invalid patches before they reach merge
    pub fn validate(&self) -> Result<(), BundleError> {
        match &self.files {
            Some(files) => check_unique_paths(files),
            None => Ok(()),
        }
    }
}

fn check_unique_paths(files: &[BundleFile]) -> Result<(), BundleError> {
    let mut seen = HashSet::new();
    for file in files {
        if !seen.insert(file.path.as_str()) {
            return Err(BundleError::DuplicatePath(file.path.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bundle() -> Bundle {
        Bundle::new(
            "FROM python:3.10-slim",
            vec![
                BundleFile::new("readme.md", "# demo"),
                BundleFile::new("main.py", "print('hi')"),
            ],
        )
    }

    #[test]
    fn test_merge_replaces_whole_files_field() {
        let bundle = sample_bundle();
        let patch = Patch {
            build_descriptor: None,
            files: Some(vec![BundleFile::new("other.py", "pass")]),
        };

        let merged = bundle.merge(&patch);

        // Full replacement, never a union with the previous files
        assert_eq!(merged.files, vec![BundleFile::new("other.py", "pass")]);
        assert_eq!(merged.build_descriptor, bundle.build_descriptor);
    }

    #[test]
    fn test_merge_absent_files_keeps_current() {
        let bundle = sample_bundle();
        let patch = Patch {
            build_descriptor: Some("FROM node:20".into()),
            files: None,
        };

        let merged = bundle.merge(&patch);

        assert_eq!(merged.build_descriptor, "FROM node:20");
        assert_eq!(merged.files, bundle.files);
    }

    #[test]
    fn test_merge_empty_files_clears_collection() {
        let bundle = sample_bundle();
        let patch = Patch {
            build_descriptor: None,
            files: Some(vec![]),
        };

        let merged = bundle.merge(&patch);

        // Empty-but-present clears, which is distinct from absent
        assert!(merged.files.is_empty());
        assert_eq!(bundle.merge(&Patch::default()).files, bundle.files);
    }

    #[test]
    fn test_merge_noop_patch_is_identity() {
        let bundle = sample_bundle();
        let merged = bundle.merge(&Patch::default());
        assert_eq!(merged, bundle);
    }

    #[test]
    fn test_patch_absent_vs_null_both_deserialize_as_none() {
        let absent: Patch = serde_json::from_str(r#"{"build_descriptor": "X"}"#).unwrap();
        let null: Patch =
            serde_json::from_str(r#"{"build_descriptor": "X", "files": null}"#).unwrap();
        assert!(absent.files.is_none());
        assert!(null.files.is_none());

        let empty: Patch =
            serde_json::from_str(r#"{"build_descriptor": "X", "files": []}"#).unwrap();
        assert_eq!(empty.files, Some(vec![]));
    }

    #[test]
    fn test_bundle_validate_rejects_empty_descriptor() {
        let bundle = Bundle::new("   ", vec![]);
        assert!(matches!(
            bundle.validate(),
            Err(BundleError::EmptyBuildDescriptor)
        ));
    }

    #[test]
    fn test_bundle_validate_rejects_duplicate_paths() {
        let bundle = Bundle::new(
            "FROM python:3.10-slim",
            vec![
                BundleFile::new("main.py", "a"),
                BundleFile::new("main.py", "b"),
            ],
        );
        assert!(matches!(
            bundle.validate(),
            Err(BundleError::DuplicatePath(path)) if path == "main.py"
        ));
    }

    #[test]
    fn test_patch_validate_rejects_duplicate_paths() {
        let patch = Patch {
            build_descriptor: None,
            files: Some(vec![
                BundleFile::new("a.txt", "1"),
                BundleFile::new("a.txt", "2"),
            ]),
        };
        assert!(patch.validate().is_err());
        assert!(Patch::default().validate().is_ok());
    }

    #[test]
    fn test_empty_files_bundle_is_still_complete() {
        let bundle = Bundle::new("FROM python:3.10-slim", vec![]);
        assert!(bundle.validate().is_ok());
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bundle::{Bundle, Patch};
use crate::error::OracleError;
use crate::exec::ExecutionOutput;

/// The judge's verdict for one round: whether the acceptance criteria are
/// met, and if not, a partial patch to apply before the next round.
///
/// Patch fields accompanying a satisfied verdict are ignored; satisfaction
/// is terminal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub satisfied: bool,
    #[serde(default)]
    pub patch: Patch,
}

impl Verdict {
    /// Get a short description of the verdict for logging
    pub fn short_description(&self) -> String {
        if self.satisfied {
            return "SATISFIED".to_string();
        }
        match (&self.patch.build_descriptor, &self.patch.files) {
            (None, None) => "NOT SATISFIED (no patch)".to_string(),
            (Some(_), None) => "NOT SATISFIED (patch: descriptor)".to_string(),
            (None, Some(files)) => {
                format!("NOT SATISFIED (patch: {} files)", files.len())
            }
            (Some(_), Some(files)) => {
                format!("NOT SATISFIED (patch: descriptor + {} files)", files.len())
            }
        }
    }
}

/// Produces the initial bundle from a task description and acceptance
/// criteria. Must return a complete bundle or an explicit error, never a
/// partially populated one.
#[async_trait]
pub trait ProposeOracle: Send + Sync {
    async fn propose(&self, task: &str, criteria: &str) -> Result<Bundle, OracleError>;
}

/// Inspects a bundle and its execution output against the acceptance
/// criteria and returns a verdict.
#[async_trait]
pub trait JudgeOracle: Send + Sync {
    async fn judge(
        &self,
        bundle: &Bundle,
        output: &ExecutionOutput,
        criteria: &str,
    ) -> Result<Verdict, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleFile;

    #[test]
    fn test_short_description_variants() {
        let satisfied = Verdict {
            satisfied: true,
            patch: Patch::default(),
        };
        assert_eq!(satisfied.short_description(), "SATISFIED");

        let bare = Verdict::default();
        assert_eq!(bare.short_description(), "NOT SATISFIED (no patch)");

        let full = Verdict {
            satisfied: false,
            patch: Patch {
                build_descriptor: Some("FROM alpine".into()),
                files: Some(vec![BundleFile::new("a", ""), BundleFile::new("b", "")]),
            },
        };
        assert_eq!(
            full.short_description(),
            "NOT SATISFIED (patch: descriptor + 2 files)"
        );
    }

    #[test]
    fn test_verdict_deserializes_without_patch() {
        let verdict: Verdict = serde_json::from_str(r#"{"satisfied": true}"#).unwrap();
        assert!(verdict.satisfied);
        assert!(verdict.patch.is_noop());
    }
}

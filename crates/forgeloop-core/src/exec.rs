use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bundle::Bundle;
use crate::error::SandboxError;

/// Captured output of building and running a bundle.
///
/// `text` is the combined diagnostic output regardless of whether the build
/// or run succeeded; the judge interprets it, so there is no success flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub text: String,
    /// Wall-clock duration of the build + run
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl ExecutionOutput {
    pub fn new(text: String, duration: Duration) -> Self {
        Self { text, duration }
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// Builds and runs a bundle in an isolated environment and captures its
/// combined text output. A fresh environment is provisioned per call; no
/// state leaks between calls.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, bundle: &Bundle) -> Result<ExecutionOutput, SandboxError>;
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::ModelReply;

/// Errors that can occur while running a model CLI process
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to spawn model process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Model CLI not found at path: {0}")]
    NotFound(String),

    #[error("Model execution failed: {0}")]
    ExecutionFailed(String),
}

/// Per-call options for a model invocation
#[derive(Debug, Clone, Default)]
pub struct ModelInvocation {
    /// Model to use (if the CLI supports selecting one)
    pub model: Option<String>,
}

impl ModelInvocation {
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }
}

/// Supported model CLIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    ClaudeCode,
    OpenCode,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::ClaudeCode => write!(f, "claude-code"),
            ModelKind::OpenCode => write!(f, "opencode"),
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-code" | "claudecode" => Ok(ModelKind::ClaudeCode),
            "opencode" | "open-code" => Ok(ModelKind::OpenCode),
            _ => Err(format!("Unknown model kind: {}", s)),
        }
    }
}

/// A spawnable LLM CLI the oracles send prompts through
#[async_trait]
pub trait ModelCli: Send + Sync {
    /// Human-readable name (e.g. "Claude Code")
    fn name(&self) -> &str;

    /// The model CLI kind
    fn kind(&self) -> ModelKind;

    /// Send one prompt and capture the full reply
    async fn run(
        &self,
        prompt: &str,
        invocation: &ModelInvocation,
    ) -> Result<ModelReply, ModelError>;

    /// Check if the CLI is available on the system
    async fn is_available(&self) -> bool;

    /// Get the path to the CLI binary
    fn binary_path(&self) -> &Path;
}

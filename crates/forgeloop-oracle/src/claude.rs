use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::{ModelCli, ModelError, ModelInvocation, ModelKind, ModelReply, ProcessSpawner};

/// Claude Code CLI backend
pub struct ClaudeCli {
    binary_path: PathBuf,
}

impl ClaudeCli {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("claude"),
        }
    }

    pub fn with_binary_path(path: PathBuf) -> Self {
        Self { binary_path: path }
    }
}

impl Default for ClaudeCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelCli for ClaudeCli {
    fn name(&self) -> &str {
        "Claude Code"
    }

    fn kind(&self) -> ModelKind {
        ModelKind::ClaudeCode
    }

    fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn run(
        &self,
        prompt: &str,
        invocation: &ModelInvocation,
    ) -> Result<ModelReply, ModelError> {
        debug!(
            model_cli = self.name(),
            prompt_len = prompt.len(),
            "Running model"
        );

        let mut args = vec![
            "--print", // Non-interactive mode, output only
        ];

        let model_arg;
        if let Some(ref model) = invocation.model {
            args.push("--model");
            model_arg = model.clone();
            args.push(&model_arg);
        }

        // Add -- to signal end of options, then the prompt as positional
        // argument so prompts starting with '-' are not read as options
        args.push("--");
        args.push(prompt);

        ProcessSpawner::spawn(&self.binary_path, &args).await
    }
}

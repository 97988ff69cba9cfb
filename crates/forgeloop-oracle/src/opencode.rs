use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::{ModelCli, ModelError, ModelInvocation, ModelKind, ModelReply, ProcessSpawner};

/// OpenCode CLI backend
pub struct OpenCodeCli {
    binary_path: PathBuf,
}

impl OpenCodeCli {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("opencode"),
        }
    }

    pub fn with_binary_path(path: PathBuf) -> Self {
        Self { binary_path: path }
    }
}

impl Default for OpenCodeCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelCli for OpenCodeCli {
    fn name(&self) -> &str {
        "OpenCode"
    }

    fn kind(&self) -> ModelKind {
        ModelKind::OpenCode
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

        // OpenCode uses the "run" subcommand for non-interactive execution
        let mut args = vec!["run"];

        let model_arg;
        if let Some(ref model) = invocation.model {
            args.push("--model");
            model_arg = model.clone();
            args.push(&model_arg);
        }

        args.push("--prompt");
        args.push(prompt);

        ProcessSpawner::spawn(&self.binary_path, &args).await
    }
}

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use forgeloop_core::{Bundle, ExecutionBackend, ExecutionOutput, SandboxError};

use crate::workspace::materialize_bundle;

/// Execution backend that builds and runs a bundle with docker.
///
/// Each call provisions a fresh temp workspace and a uniquely tagged image,
/// so nothing leaks between rounds or between concurrent tasks. Build and
/// run failures are not backend errors: their diagnostic text is the round's
/// execution output, exactly what the judge needs.
pub struct DockerBackend {
    binary_path: PathBuf,
    /// Environment passed into the container at run time
    env_vars: Vec<(String, String)>,
}

impl DockerBackend {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("docker"),
            env_vars: Vec::new(),
        }
    }

    pub fn with_binary_path(mut self, path: PathBuf) -> Self {
        self.binary_path = path;
        self
    }

    /// Variables injected into `docker run`; empty values are skipped
    pub fn with_env_vars(mut self, env_vars: Vec<(String, String)>) -> Self {
        self.env_vars = env_vars
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .collect();
        self
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn docker(&self, args: &[String], cwd: &Path) -> Result<Output, SandboxError> {
        debug!(args = ?args, "Running docker");
        let output = Command::new(&self.binary_path)
            .args(args)
            .current_dir(cwd)
            // The controller enforces the step deadline by dropping this
            // future; the docker client must not outlive it.
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(output)
    }
}

impl Default for DockerBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionBackend for DockerBackend {
    async fn execute(&self, bundle: &Bundle) -> Result<ExecutionOutput, SandboxError> {
        bundle.validate()?;

        let start = Instant::now();
        let workspace = tempfile::tempdir()
            .map_err(|e| SandboxError::Workspace(e.to_string()))?;
        materialize_bundle(workspace.path(), bundle)?;

        let tag = format!("forgeloop-{}", Uuid::new_v4());

        let build_args: Vec<String> = ["build", "-t", tag.as_str(), "."]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let build = self.docker(&build_args, workspace.path()).await?;
        if !build.status.success() {
            debug!(tag = %tag, "Build failed, captured diagnostics for the judge");
            return Ok(ExecutionOutput::new(
                stderr_or_stdout(&build),
                start.elapsed(),
            ));
        }

        let mut run_args: Vec<String> = vec!["run".to_string(), "--rm".to_string()];
        for (key, value) in &self.env_vars {
            run_args.push("-e".to_string());
            run_args.push(format!("{}={}", key, value));
        }
        run_args.push(tag.clone());

        let run = self.docker(&run_args, workspace.path()).await;

        // Image cleanup is best-effort
        let rmi_args: Vec<String> = ["rmi", "-f", tag.as_str()]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Err(e) = self.docker(&rmi_args, workspace.path()).await {
            warn!(tag = %tag, error = %e, "Failed to remove image");
        }

        let run = run?;
        let text = if run.status.success() {
            String::from_utf8_lossy(&run.stdout).into_owned()
        } else {
            stderr_or_stdout(&run)
        };
        Ok(ExecutionOutput::new(text, start.elapsed()))
    }
}

fn stderr_or_stdout(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).into_owned()
    } else {
        stderr.into_owned()
    }
}

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::{ModelError, ModelReply};

/// Utility for spawning model CLI processes
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Spawn a process and capture its output
    pub async fn spawn(binary: &Path, args: &[&str]) -> Result<ModelReply, ModelError> {
        let start = Instant::now();

        debug!(
            binary = %binary.display(),
            args_len = args.len(),
            "Spawning model process"
        );

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null()) // Non-interactive
            // The caller enforces the step deadline by dropping this future;
            // the child must not outlive it.
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let stdout_handle = child.stdout.take().expect("stdout not captured");
        let stderr_handle = child.stderr.take().expect("stderr not captured");

        let mut stdout_reader = BufReader::new(stdout_handle).lines();
        let mut stderr_reader = BufReader::new(stderr_handle).lines();

        let mut stdout = String::new();
        let mut stderr = String::new();

        // Read both streams concurrently
        loop {
            tokio::select! {
                biased;

                result = stdout_reader.next_line() => {
                    match result {
                        Ok(Some(line)) => {
                            trace!(line = %line, "stdout");
                            if !stdout.is_empty() {
                                stdout.push('\n');
                            }
                            stdout.push_str(&line);
                        }
                        Ok(None) => {
                            // stdout closed, drain stderr then stop
                            while let Ok(Some(line)) = stderr_reader.next_line().await {
                                trace!(line = %line, "stderr");
                                if !stderr.is_empty() {
                                    stderr.push('\n');
                                }
                                stderr.push_str(&line);
                            }
                            break;
                        }
                        Err(e) => {
                            return Err(ModelError::ExecutionFailed(format!(
                                "Failed to read stdout: {}",
                                e
                            )));
                        }
                    }
                }
                result = stderr_reader.next_line() => {
                    match result {
                        Ok(Some(line)) => {
                            trace!(line = %line, "stderr");
                            if !stderr.is_empty() {
                                stderr.push('\n');
                            }
                            stderr.push_str(&line);
                        }
                        Ok(None) => {
                            // stderr closed, continue reading stdout
                        }
                        Err(e) => {
                            return Err(ModelError::ExecutionFailed(format!(
                                "Failed to read stderr: {}",
                                e
                            )));
                        }
                    }
                }
            }
        }

        let status = child.wait().await?;
        let duration = start.elapsed();

        debug!(
            exit_code = status.code().unwrap_or(-1),
            duration_ms = duration.as_millis(),
            "Model process completed"
        );

        Ok(ModelReply::new(
            stdout,
            stderr,
            status.code().unwrap_or(-1),
            duration,
        ))
    }
}

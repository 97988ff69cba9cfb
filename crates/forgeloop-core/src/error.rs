use std::time::Duration;

use thiserror::Error;

use crate::bundle::BundleError;

/// Errors surfaced by the propose and judge oracles.
///
/// During a round these are absorbed as "not satisfied, no patch"; only a
/// failure of the initial proposal is fatal to the task.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle transport failed: {0}")]
    Transport(String),

    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle declined to answer: {0}")]
    Refused(String),

    #[error("malformed oracle reply: {0}")]
    Malformed(String),

    #[error("proposed bundle is incomplete: {0}")]
    IncompleteBundle(#[from] BundleError),
}

/// Errors surfaced by the execution backend.
///
/// A failing build or run inside the sandbox is not an error here; the
/// captured diagnostic text is ordinary judge input. These cover the backend
/// itself breaking: workspace provisioning, process spawn, deadline.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("failed to provision sandbox workspace: {0}")]
    Workspace(String),

    #[error("failed to spawn sandbox process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("sandbox execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("bundle cannot be executed: {0}")]
    InvalidBundle(#[from] BundleError),
}

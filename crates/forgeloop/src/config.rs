//! Project configuration file support for forgeloop.
//!
//! Loads configuration from `forgeloop.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project-level configuration loaded from `forgeloop.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Global default model CLI (applies to both oracles)
    pub cli: Option<String>,
    /// Global default model (applies to both oracles)
    pub model: Option<String>,
    /// Round budget override
    pub max_rounds: Option<usize>,
    /// Per-step deadline override (e.g. "300s", "5m")
    #[serde(default, with = "humantime_serde")]
    pub step_timeout: Option<Duration>,
    /// Propose-oracle-specific configuration
    #[serde(default)]
    pub propose: RoleConfig,
    /// Judge-oracle-specific configuration
    #[serde(default)]
    pub judge: RoleConfig,
    /// Sandbox configuration
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

/// Configuration for a specific oracle role
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    /// Model CLI to use for this role
    pub cli: Option<String>,
    /// Model to use for this role
    pub model: Option<String>,
}

/// Sandbox section of the configuration
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SandboxConfig {
    /// Names of environment variables passed into the container; values are
    /// read from the server process environment at task start
    #[serde(default)]
    pub env: Vec<String>,
    /// Docker binary override
    pub docker_binary: Option<PathBuf>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "forgeloop.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Get the effective model CLI for the propose role.
    /// Priority: [propose].cli > global cli > None
    pub fn propose_cli(&self) -> Option<&str> {
        self.propose.cli.as_deref().or(self.cli.as_deref())
    }

    /// Get the effective model for the propose role.
    /// Priority: [propose].model > global model > None
    pub fn propose_model(&self) -> Option<&str> {
        self.propose.model.as_deref().or(self.model.as_deref())
    }

    /// Get the effective model CLI for the judge role.
    /// Priority: [judge].cli > global cli > None
    pub fn judge_cli(&self) -> Option<&str> {
        self.judge.cli.as_deref().or(self.cli.as_deref())
    }

    /// Get the effective model for the judge role.
    /// Priority: [judge].model > global model > None
    pub fn judge_model(&self) -> Option<&str> {
        self.judge.model.as_deref().or(self.model.as_deref())
    }
}

use async_trait::async_trait;
use tracing::{debug, info};

use forgeloop_core::{Bundle, OracleError, ProposeOracle};

use crate::proposal::parse_bundle_reply;
use crate::{ModelCli, ModelInvocation, PromptTemplates};

/// Propose oracle backed by a model CLI.
///
/// Builds the generation prompt, runs the model once, and parses the reply
/// into a complete bundle. Any failure here is fatal for the task, so errors
/// are precise rather than lenient.
pub struct Proposer {
    model: Box<dyn ModelCli>,
    templates: PromptTemplates,
    invocation: ModelInvocation,
    env_names: Vec<String>,
}

impl Proposer {
    pub fn new(model: Box<dyn ModelCli>, templates: PromptTemplates) -> Self {
        Self {
            model,
            templates,
            invocation: ModelInvocation::default(),
            env_names: Vec::new(),
        }
    }

    pub fn with_invocation(mut self, invocation: ModelInvocation) -> Self {
        self.invocation = invocation;
        self
    }

    /// Names of environment variables the sandbox will provide; surfaced to
    /// the generation prompt so proposed code can read them
    pub fn with_env_names(mut self, names: Vec<String>) -> Self {
        self.env_names = names;
        self
    }

    pub fn model(&self) -> &dyn ModelCli {
        self.model.as_ref()
    }
}

#[async_trait]
impl ProposeOracle for Proposer {
    async fn propose(&self, task: &str, criteria: &str) -> Result<Bundle, OracleError> {
        let prompt = self
            .templates
            .render_generation(task, criteria, &self.env_names);

        debug!(prompt_len = prompt.len(), "Running propose model");

        let reply = self
            .model
            .run(&prompt, &self.invocation)
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        info!(
            exit_code = reply.exit_code,
            duration_secs = reply.duration.as_secs_f64(),
            "Propose model completed"
        );

        if !reply.success() {
            return Err(OracleError::Transport(format!(
                "propose model exited with code {}",
                reply.exit_code
            )));
        }

        let bundle =
            parse_bundle_reply(&reply.stdout).map_err(|e| OracleError::Malformed(e.to_string()))?;
        bundle.validate()?;
        Ok(bundle)
    }
}

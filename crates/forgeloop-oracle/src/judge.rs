use async_trait::async_trait;
use tracing::{debug, info};

use forgeloop_core::{Bundle, ExecutionOutput, JudgeOracle, OracleError, Verdict};

use crate::verdict::parse_verdict_reply;
use crate::{ModelCli, ModelInvocation, PromptTemplates};

/// Judge oracle backed by a model CLI.
///
/// Builds the review prompt from the bundle, its execution output and the
/// acceptance criteria, then parses the model's verdict. Errors here are
/// absorbed by the controller as "not satisfied, no patch", so a refusal or
/// a garbled reply costs one round, not the task.
pub struct ReviewJudge {
    model: Box<dyn ModelCli>,
    templates: PromptTemplates,
    invocation: ModelInvocation,
}

impl ReviewJudge {
    pub fn new(model: Box<dyn ModelCli>, templates: PromptTemplates) -> Self {
        Self {
            model,
            templates,
            invocation: ModelInvocation::default(),
        }
    }

    pub fn with_invocation(mut self, invocation: ModelInvocation) -> Self {
        self.invocation = invocation;
        self
    }

    pub fn model(&self) -> &dyn ModelCli {
        self.model.as_ref()
    }
}

#[async_trait]
impl JudgeOracle for ReviewJudge {
    async fn judge(
        &self,
        bundle: &Bundle,
        output: &ExecutionOutput,
        criteria: &str,
    ) -> Result<Verdict, OracleError> {
        let prompt = self.templates.render_review(criteria, bundle, &output.text);

        debug!(prompt_len = prompt.len(), "Running judge model");

        let reply = self
            .model
            .run(&prompt, &self.invocation)
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        info!(
            exit_code = reply.exit_code,
            duration_secs = reply.duration.as_secs_f64(),
            "Judge model completed"
        );

        if !reply.success() {
            return Err(OracleError::Transport(format!(
                "judge model exited with code {}",
                reply.exit_code
            )));
        }

        parse_verdict_reply(&reply.stdout).map_err(|e| OracleError::Malformed(e.to_string()))
    }
}

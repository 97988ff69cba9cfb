mod block;
mod claude;
mod judge;
mod opencode;
mod proposal;
mod proposer;
mod prompts;
mod reply;
mod spawner;
mod traits;
mod verdict;

pub use claude::ClaudeCli;
pub use judge::ReviewJudge;
pub use opencode::OpenCodeCli;
pub use proposal::{parse_bundle_reply, ProposalParseError};
pub use proposer::Proposer;
pub use prompts::PromptTemplates;
pub use reply::ModelReply;
pub use spawner::ProcessSpawner;
pub use traits::{ModelCli, ModelError, ModelInvocation, ModelKind};
pub use verdict::{parse_verdict_reply, VerdictParseError};

/// Create a model CLI by kind
pub fn create_model(kind: ModelKind) -> Box<dyn ModelCli> {
    match kind {
        ModelKind::ClaudeCode => Box::new(ClaudeCli::new()),
        ModelKind::OpenCode => Box::new(OpenCodeCli::new()),
    }
}

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use forgeloop_core::{Controller, TaskContext, TaskOutcome};
use forgeloop_logging::{LogFormat, Logger};
use forgeloop_oracle::{create_model, ModelInvocation, Proposer, ReviewJudge};
use forgeloop_sandbox::DockerBackend;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub task: String,
    pub criteria: String,
    /// Round budget override for this task
    pub max_rounds: Option<usize>,
}

/// POST /api/tasks - run one task to its terminal outcome and return it
/// with the full round history
pub async fn run_task(
    State(state): State<AppState>,
    Json(request): Json<TaskRequest>,
) -> Json<TaskOutcome> {
    info!(task_len = request.task.len(), "Task submitted");

    let templates = state.prompts.read().await.clone();
    let options = &state.options;

    let env_names: Vec<String> = options
        .sandbox_env
        .iter()
        .map(|(name, _)| name.clone())
        .collect();

    let proposer = Proposer::new(create_model(options.propose_kind), templates.clone())
        .with_invocation(ModelInvocation {
            model: options.propose_model.clone(),
        })
        .with_env_names(env_names);
    let judge = ReviewJudge::new(create_model(options.judge_kind), templates).with_invocation(
        ModelInvocation {
            model: options.judge_model.clone(),
        },
    );

    let mut backend = DockerBackend::new().with_env_vars(options.sandbox_env.clone());
    if let Some(ref binary) = options.docker_binary {
        backend = backend.with_binary_path(binary.clone());
    }

    let logger = Arc::new(Logger::new(LogFormat::Compact));
    let controller = Controller::new(&proposer, &judge, &backend, logger);

    let ctx = TaskContext::new(request.task, request.criteria)
        .with_max_rounds(request.max_rounds.unwrap_or(options.max_rounds))
        .with_step_timeout(options.step_timeout);

    Json(controller.run(ctx).await)
}

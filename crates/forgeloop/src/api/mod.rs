mod prompts;
mod tasks;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use forgeloop_oracle::{ModelKind, PromptTemplates};

/// Fixed per-server settings every submitted task starts from
pub struct ServeOptions {
    pub propose_kind: ModelKind,
    pub judge_kind: ModelKind,
    pub propose_model: Option<String>,
    pub judge_model: Option<String>,
    pub max_rounds: usize,
    pub step_timeout: Duration,
    /// Environment passed into the sandbox at run time
    pub sandbox_env: Vec<(String, String)>,
    pub docker_binary: Option<PathBuf>,
}

#[derive(Clone)]
pub struct AppState {
    /// Prompt templates applied to subsequently submitted tasks. Kept as
    /// per-server shared state, never process-global, so each task snapshots
    /// the templates at start and concurrent tasks cannot interfere.
    pub prompts: Arc<RwLock<PromptTemplates>>,
    pub options: Arc<ServeOptions>,
}

pub fn create_router(options: ServeOptions) -> Router {
    let state = AppState {
        prompts: Arc::new(RwLock::new(PromptTemplates::default())),
        options: Arc::new(options),
    };

    Router::new()
        .route("/api/tasks", post(tasks::run_task))
        .route(
            "/api/prompts",
            get(prompts::get_prompts).put(prompts::update_prompts),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

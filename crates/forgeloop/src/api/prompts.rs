use axum::extract::State;
use axum::Json;

use forgeloop_oracle::PromptTemplates;

use super::AppState;

/// GET /api/prompts - the templates applied to newly submitted tasks
pub async fn get_prompts(State(state): State<AppState>) -> Json<PromptTemplates> {
    Json(state.prompts.read().await.clone())
}

/// PUT /api/prompts - replace the templates for subsequently submitted
/// tasks; tasks already running keep their snapshot
pub async fn update_prompts(
    State(state): State<AppState>,
    Json(templates): Json<PromptTemplates>,
) -> Json<PromptTemplates> {
    *state.prompts.write().await = templates.clone();
    Json(templates)
}

use axum::{extract::State, routing::get, Json, Router};
use taskdeck_core::TaskStats;

use super::AppState;
use crate::error::ApiError;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/stats", get(task_stats))
}

async fn task_stats(State(state): State<AppState>) -> Result<Json<TaskStats>, ApiError> {
    Ok(Json(state.db.task_stats().await?))
}

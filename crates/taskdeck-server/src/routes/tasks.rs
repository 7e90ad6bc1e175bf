use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use taskdeck_core::task::{CreateTaskRequest, ListTasksQuery, Task, TaskPage, UpdateTaskRequest};

use super::extract::{JsonBody, QueryParams, TaskId};
use super::AppState;
use crate::error::ApiError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}

async fn list_tasks(
    State(state): State<AppState>,
    QueryParams(q): QueryParams<ListTasksQuery>,
) -> Result<Json<TaskPage>, ApiError> {
    let filter = q.validate()?;
    let page = state.db.list_tasks(&filter).await?;
    Ok(Json(page))
}

async fn get_task(
    State(state): State<AppState>,
    TaskId(id): TaskId,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.db.get_task(id).await?))
}

async fn create_task(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let input = input.validate()?;
    let task = state.db.create_task(&input).await?;
    tracing::info!(id = task.id, title = %task.title, "created task");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<AppState>,
    TaskId(id): TaskId,
    JsonBody(input): JsonBody<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let update = input.validate()?;
    let task = state.db.update_task(id, &update).await?;
    tracing::info!(id, status = %task.status, "updated task");
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    TaskId(id): TaskId,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_task(id).await? {
        return Err(ApiError::task_not_found(id));
    }
    tracing::info!(id, "deleted task");
    Ok(StatusCode::NO_CONTENT)
}

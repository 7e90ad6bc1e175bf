pub mod extract;
pub mod health;
pub mod index;
pub mod metrics;
pub mod stats;
pub mod tasks;

use std::any::Any;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use taskdeck_db::Database;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::Config;
use crate::metrics::{track_requests, Metrics};

pub struct InnerAppState {
    pub db: Arc<dyn Database>,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(index::routes())
        .merge(health::routes())
        .merge(metrics::routes())
        .merge(tasks::routes())
        .merge(stats::routes())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal server error" })),
    )
        .into_response()
}

use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::config::VERSION;

/// How long `/health` waits on the store before calling it disconnected.
const PING_TIMEOUT: Duration = Duration::from_secs(2);

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    timestamp: DateTime<Utc>,
    version: &'static str,
    database: &'static str,
    uptime_seconds: f64,
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let connected = match tokio::time::timeout(PING_TIMEOUT, state.db.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "health check: database ping failed");
            false
        }
        Err(_) => {
            tracing::warn!("health check: database ping timed out");
            false
        }
    };

    let (code, status, database) = if connected {
        (StatusCode::OK, "healthy", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
    };

    (
        code,
        Json(HealthReport {
            status,
            timestamp: Utc::now(),
            version: VERSION,
            database,
            uptime_seconds: state.metrics.uptime_seconds(),
        }),
    )
}

use axum::{extract::State, response::Html, routing::get, Router};

use super::AppState;
use crate::config::{Storage, APP_NAME, VERSION};

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(index))
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let storage = match state.config.storage {
        Storage::Sqlite => "SQLite",
        Storage::Memory => "in-memory",
    };
    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{APP_NAME}</title>
</head>
<body>
  <h1>{APP_NAME}</h1>
  <p>Version {VERSION}, {storage} storage</p>
  <ul>
    <li><a href="/api/tasks">/api/tasks</a> - task list</li>
    <li><a href="/api/stats">/api/stats</a> - task counts</li>
    <li><a href="/health">/health</a> - liveness and database status</li>
    <li><a href="/metrics">/metrics</a> - Prometheus metrics</li>
  </ul>
</body>
</html>
"#
    ))
}

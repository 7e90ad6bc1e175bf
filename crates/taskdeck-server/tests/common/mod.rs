// Shared helpers for the server integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use taskdeck_core::task::{CreateTask, Task, TaskFilter, TaskPage, UpdateTask};
use taskdeck_core::TaskStats;
use taskdeck_db::{Database, DbError, MemoryDatabase};
use taskdeck_server::config::Config;
use taskdeck_server::routes::{build_router, AppState};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceExt;

pub fn memory_state() -> AppState {
    taskdeck_server::app_state(Arc::new(MemoryDatabase::new()), Config::default())
}

pub fn router_for(state: &AppState) -> Router {
    build_router(state.clone())
}

/// Send one request through `app`; returns the status and the body parsed as
/// JSON (`Value::Null` for an empty body).
pub async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return (status, Value::Null);
    }
    (status, serde_json::from_slice(&bytes).unwrap())
}

pub async fn get_text(app: &Router, uri: &str) -> String {
    let resp = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A running test server with `base_url` and a handle to stop it.
pub struct TestServer {
    pub base_url: String,
    stop: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Trigger graceful shutdown and wait for the server task to exit.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        (&mut self.handle).await.unwrap();
    }
}

/// Spawn the full app on a random localhost port.
pub async fn spawn_test_server(state: AppState) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        taskdeck_server::serve(listener, state, async {
            let _ = stopped.await;
        })
        .await
        .unwrap();
    });
    TestServer {
        base_url: format!("http://{addr}"),
        stop: Some(stop),
        handle,
    }
}

/// A store whose every call fails with a message that must never reach a
/// client.
pub struct FailingDatabase;

pub const SECRET_DETAIL: &str = "disk I/O error in /srv/private/tasks.db";

fn fail<T>() -> Result<T, DbError> {
    Err(DbError::Internal(SECRET_DETAIL.into()))
}

#[async_trait]
impl Database for FailingDatabase {
    async fn create_task(&self, _input: &CreateTask) -> Result<Task, DbError> {
        fail()
    }
    async fn get_task(&self, _id: i64) -> Result<Task, DbError> {
        fail()
    }
    async fn list_tasks(&self, _filter: &TaskFilter) -> Result<TaskPage, DbError> {
        fail()
    }
    async fn update_task(&self, _id: i64, _update: &UpdateTask) -> Result<Task, DbError> {
        fail()
    }
    async fn delete_task(&self, _id: i64) -> Result<bool, DbError> {
        fail()
    }
    async fn task_stats(&self) -> Result<TaskStats, DbError> {
        fail()
    }
    async fn ping(&self) -> Result<(), DbError> {
        fail()
    }
}

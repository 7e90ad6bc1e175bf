use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use taskdeck_core::task::{CreateTask, Task, TaskFilter, TaskPage, UpdateTask};
use taskdeck_core::TaskStats;
use taskdeck_db::{Database, DbError, MemoryDatabase};

use crate::config::Config;
use crate::routes::{build_router, AppState};

/// State over an empty in-memory store and a fresh metrics registry.
pub fn test_state() -> AppState {
    state_with_db(Arc::new(MemoryDatabase::new()))
}

pub fn state_with_db(db: Arc<dyn Database>) -> AppState {
    crate::app_state(db, Config::default())
}

pub fn test_router() -> Router {
    build_router(test_state())
}

/// A store that is unreachable: every call either errors or never returns.
pub struct BrokenDatabase {
    pub hang: bool,
}

impl BrokenDatabase {
    async fn fail<T>(&self) -> Result<T, DbError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        Err(DbError::Internal("database is locked".into()))
    }
}

#[async_trait]
impl Database for BrokenDatabase {
    async fn create_task(&self, _input: &CreateTask) -> Result<Task, DbError> {
        self.fail().await
    }
    async fn get_task(&self, _id: i64) -> Result<Task, DbError> {
        self.fail().await
    }
    async fn list_tasks(&self, _filter: &TaskFilter) -> Result<TaskPage, DbError> {
        self.fail().await
    }
    async fn update_task(&self, _id: i64, _update: &UpdateTask) -> Result<Task, DbError> {
        self.fail().await
    }
    async fn delete_task(&self, _id: i64) -> Result<bool, DbError> {
        self.fail().await
    }
    async fn task_stats(&self) -> Result<TaskStats, DbError> {
        self.fail().await
    }
    async fn ping(&self) -> Result<(), DbError> {
        self.fail().await
    }
}

pub mod memory;
pub mod sqlite;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use taskdeck_core::task::{CreateTask, Task, TaskFilter, TaskPage, UpdateTask};
use taskdeck_core::TaskStats;

pub use memory::MemoryDatabase;
pub use sqlite::SqliteDatabase;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Which backend `open_database` builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    pub backend: Backend,
    /// SQLite file. Falls back to `tasks.db` in the working directory.
    pub sqlite_path: Option<PathBuf>,
}

/// Storage for tasks.
///
/// The route layer only ever sees this trait. `SqliteDatabase` is the
/// production backend; `MemoryDatabase` keeps everything in process and is
/// what most tests run against.
#[async_trait]
pub trait Database: Send + Sync {
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError>;
    async fn get_task(&self, id: i64) -> Result<Task, DbError>;
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, DbError>;
    async fn update_task(&self, id: i64, update: &UpdateTask) -> Result<Task, DbError>;
    /// Returns whether a row was actually removed.
    async fn delete_task(&self, id: i64) -> Result<bool, DbError>;
    async fn task_stats(&self) -> Result<TaskStats, DbError>;

    /// Cheap round trip to the store, for health checks.
    async fn ping(&self) -> Result<(), DbError>;
}

pub fn open_database(config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    match config.backend {
        Backend::Sqlite => Ok(Arc::new(SqliteDatabase::open(config)?)),
        Backend::Memory => Ok(Arc::new(MemoryDatabase::new())),
    }
}

pub(crate) fn not_found(id: i64) -> DbError {
    DbError::NotFound(format!("task {id}"))
}

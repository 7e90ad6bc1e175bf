pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use taskdeck_core::task::{CreateTask, Task, TaskFilter, TaskPage, UpdateTask};
use taskdeck_core::TaskStats;

use crate::{Database, DbConfig, DbError};

const DEFAULT_FILE: &str = "tasks.db";

/// SQL function lowering text with Rust's Unicode rules. SQLite's own
/// `LOWER()` and `LIKE` only fold ASCII.
pub(crate) const UNICODE_LOWER: &str = "unicode_lower";

/// Extension trait that converts `rusqlite::Result<T>` into `Result<T, DbError>`.
///
/// `.to_db()?` is the shortest way to surface a rusqlite failure as a storage
/// error inside the query modules.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE));
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        tracing::debug!(path = %path.display(), "opened sqlite database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        register_functions(&conn)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))
    }

    /// Run `f` with the connection held for the duration of the call only.
    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Like `with_conn`, inside a transaction. Commits when `f` succeeds; the
    /// transaction rolls back on drop otherwise.
    pub(crate) fn with_tx<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().to_db()?;
        let out = f(&tx)?;
        tx.commit().to_db()?;
        Ok(out)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(migrations::run)
    }
}

fn register_functions(conn: &Connection) -> Result<(), DbError> {
    conn.create_scalar_function(
        UNICODE_LOWER,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
    .to_db()
}

/// Map a `rusqlite::Error` into a `DbError::Internal`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    DbError::Internal(e.to_string())
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError> {
        let db = self.clone();
        let input = input.clone();
        tokio::task::spawn_blocking(move || db.create_task_sync(&input))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn get_task(&self, id: i64) -> Result<Task, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.get_task_sync(id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, DbError> {
        let db = self.clone();
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || db.list_tasks_sync(&filter))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn update_task(&self, id: i64, update: &UpdateTask) -> Result<Task, DbError> {
        let db = self.clone();
        let update = update.clone();
        tokio::task::spawn_blocking(move || db.update_task_sync(id, &update))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn delete_task(&self, id: i64) -> Result<bool, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.delete_task_sync(id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn task_stats(&self) -> Result<TaskStats, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.task_stats_sync())
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    async fn ping(&self) -> Result<(), DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || {
            db.with_conn(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .to_db()?;
                Ok(())
            })
        })
        .await
        .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

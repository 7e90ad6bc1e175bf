use rusqlite::Connection;

use super::SqliteResultExt;
use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    // Idempotent: safe to run on every open.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            description TEXT,
            status      TEXT NOT NULL DEFAULT 'pending'
                            CHECK(status IN ('pending', 'in_progress', 'completed')),
            priority    TEXT NOT NULL DEFAULT 'medium'
                            CHECK(priority IN ('low', 'medium', 'high')),
            due_date    TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_status   ON tasks(status);
        CREATE INDEX IF NOT EXISTS idx_tasks_priority ON tasks(priority);
        CREATE INDEX IF NOT EXISTS idx_tasks_created  ON tasks(created_at);
        ",
    )
    .to_db()?;
    Ok(())
}

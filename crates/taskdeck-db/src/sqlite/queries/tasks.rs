use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use taskdeck_core::task::{
    next_updated_at, CreateTask, Priority, Status, Task, TaskFilter, TaskPage, UpdateTask,
};
use taskdeck_core::TaskStats;

use super::super::{SqliteDatabase, SqliteResultExt, UNICODE_LOWER};
use crate::{not_found, DbError};

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    let status_str: String = row.get("status")?;
    let priority_str: String = row.get("priority")?;
    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        // CHECK constraints keep both columns inside the enum.
        status: Status::parse_str(&status_str).unwrap_or_default(),
        priority: Priority::parse_str(&priority_str).unwrap_or_default(),
        due_date: row.get("due_date")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn find_task(conn: &Connection, id: i64) -> Result<Option<Task>, DbError> {
    conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
        .optional()
        .to_db()
}

/// `%needle%` with LIKE's own wildcards escaped, for use with `ESCAPE '\'`.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl SqliteDatabase {
    pub fn create_task_sync(&self, input: &CreateTask) -> Result<Task, DbError> {
        self.with_tx(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO tasks (title, description, status, priority, due_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    input.title,
                    input.description,
                    Status::Pending.as_str(),
                    input.priority.as_str(),
                    input.due_date,
                    now,
                    now,
                ],
            )
            .to_db()?;

            let id = conn.last_insert_rowid();
            find_task(conn, id)?.ok_or_else(|| not_found(id))
        })
    }

    pub fn get_task_sync(&self, id: i64) -> Result<Task, DbError> {
        self.with_conn(|conn| find_task(conn, id)?.ok_or_else(|| not_found(id)))
    }

    pub fn list_tasks_sync(&self, filter: &TaskFilter) -> Result<TaskPage, DbError> {
        self.with_conn(|conn| {
            let mut where_sql = String::from(" WHERE 1=1");
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(status) = filter.status {
                param_values.push(Box::new(status.as_str().to_string()));
                where_sql.push_str(&format!(" AND status = ?{}", param_values.len()));
            }
            if let Some(priority) = filter.priority {
                param_values.push(Box::new(priority.as_str().to_string()));
                where_sql.push_str(&format!(" AND priority = ?{}", param_values.len()));
            }
            if let Some(ref search) = filter.search {
                param_values.push(Box::new(like_pattern(search)));
                let n = param_values.len();
                where_sql.push_str(&format!(
                    " AND ({UNICODE_LOWER}(title) LIKE {UNICODE_LOWER}(?{n}) ESCAPE '\\'
                      OR {UNICODE_LOWER}(COALESCE(description, '')) LIKE {UNICODE_LOWER}(?{n}) ESCAPE '\\')"
                ));
            }

            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();

            let total: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM tasks{where_sql}"),
                    params_ref.as_slice(),
                    |row| row.get(0),
                )
                .to_db()?;

            let mut page_params = params_ref;
            page_params.push(&filter.limit);
            let limit_param = page_params.len();
            page_params.push(&filter.offset);
            let offset_param = page_params.len();

            let sql = format!(
                "SELECT * FROM tasks{where_sql}
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?{limit_param} OFFSET ?{offset_param}"
            );
            let mut stmt = conn.prepare(&sql).to_db()?;
            let tasks = stmt
                .query_map(page_params.as_slice(), row_to_task)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;

            Ok(TaskPage { tasks, total })
        })
    }

    pub fn update_task_sync(&self, id: i64, update: &UpdateTask) -> Result<Task, DbError> {
        self.with_tx(|conn| {
            let existing = find_task(conn, id)?.ok_or_else(|| not_found(id))?;
            if update.is_empty() {
                return Ok(existing);
            }

            let now = next_updated_at(existing.updated_at);
            let mut sets = vec!["updated_at = ?1".to_string()];
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];

            if let Some(ref title) = update.title {
                param_values.push(Box::new(title.clone()));
                sets.push(format!("title = ?{}", param_values.len()));
            }
            if let Some(ref description) = update.description {
                param_values.push(Box::new(description.clone()));
                sets.push(format!("description = ?{}", param_values.len()));
            }
            if let Some(status) = update.status {
                param_values.push(Box::new(status.as_str().to_string()));
                sets.push(format!("status = ?{}", param_values.len()));
            }
            if let Some(priority) = update.priority {
                param_values.push(Box::new(priority.as_str().to_string()));
                sets.push(format!("priority = ?{}", param_values.len()));
            }
            if let Some(due_date) = update.due_date {
                param_values.push(Box::new(due_date));
                sets.push(format!("due_date = ?{}", param_values.len()));
            }

            param_values.push(Box::new(id));
            let id_param = param_values.len();

            let sql = format!(
                "UPDATE tasks SET {} WHERE id = ?{}",
                sets.join(", "),
                id_param
            );

            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();

            let changed = conn.execute(&sql, params_ref.as_slice()).to_db()?;
            if changed == 0 {
                return Err(not_found(id));
            }

            find_task(conn, id)?.ok_or_else(|| not_found(id))
        })
    }

    pub fn delete_task_sync(&self, id: i64) -> Result<bool, DbError> {
        self.with_tx(|conn| {
            let changed = conn
                .execute("DELETE FROM tasks WHERE id = ?1", params![id])
                .to_db()?;
            Ok(changed > 0)
        })
    }

    pub fn task_stats_sync(&self) -> Result<TaskStats, DbError> {
        self.with_conn(|conn| {
            let mut stats = TaskStats::default();

            let mut stmt = conn
                .prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")
                .to_db()?;
            let by_status = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            for (status, n) in by_status {
                if let Some(status) = Status::parse_str(&status) {
                    stats.by_status.add(status, n);
                }
            }

            let mut stmt = conn
                .prepare("SELECT priority, COUNT(*) FROM tasks GROUP BY priority")
                .to_db()?;
            let by_priority = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            for (priority, n) in by_priority {
                if let Some(priority) = Priority::parse_str(&priority) {
                    stats.by_priority.add(priority, n);
                }
            }

            stats.total_tasks = conn
                .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
                .to_db()?;
            Ok(stats)
        })
    }
}

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use taskdeck_core::task::{
    next_updated_at, CreateTask, Status, Task, TaskFilter, TaskPage, UpdateTask,
};
use taskdeck_core::TaskStats;

use crate::{not_found, Database, DbError};

#[derive(Default)]
struct State {
    last_id: i64,
    tasks: BTreeMap<i64, Task>,
}

/// Process-local task store. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, DbError> {
        self.state
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError> {
        let mut state = self.lock()?;
        state.last_id += 1;
        let now = Utc::now();
        let task = Task {
            id: state.last_id,
            title: input.title.clone(),
            description: input.description.clone(),
            status: Status::Pending,
            priority: input.priority,
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: i64) -> Result<Task, DbError> {
        let state = self.lock()?;
        state.tasks.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, DbError> {
        let state = self.lock()?;
        let mut matching: Vec<&Task> = state.tasks.values().filter(|t| filter.matches(t)).collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as i64;
        let tasks = matching
            .into_iter()
            .skip(usize::try_from(filter.offset).unwrap_or(0))
            .take(usize::try_from(filter.limit).unwrap_or(0))
            .cloned()
            .collect();
        Ok(TaskPage { tasks, total })
    }

    async fn update_task(&self, id: i64, update: &UpdateTask) -> Result<Task, DbError> {
        let mut state = self.lock()?;
        let task = state.tasks.get_mut(&id).ok_or_else(|| not_found(id))?;
        if !update.is_empty() {
            update.apply_to(task);
            task.updated_at = next_updated_at(task.updated_at);
        }
        Ok(task.clone())
    }

    async fn delete_task(&self, id: i64) -> Result<bool, DbError> {
        let mut state = self.lock()?;
        Ok(state.tasks.remove(&id).is_some())
    }

    async fn task_stats(&self) -> Result<TaskStats, DbError> {
        let state = self.lock()?;
        Ok(TaskStats::tally(state.tasks.values()))
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.lock().map(|_| ())
    }
}

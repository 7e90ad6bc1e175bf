use serde::{Deserialize, Serialize};

use crate::task::{Priority, Status, Task};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
}

impl StatusCounts {
    pub fn add(&mut self, status: Status, n: i64) {
        match status {
            Status::Pending => self.pending += n,
            Status::InProgress => self.in_progress += n,
            Status::Completed => self.completed += n,
        }
    }

    pub fn sum(&self) -> i64 {
        self.pending + self.in_progress + self.completed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
}

impl PriorityCounts {
    pub fn add(&mut self, priority: Priority, n: i64) {
        match priority {
            Priority::Low => self.low += n,
            Priority::Medium => self.medium += n,
            Priority::High => self.high += n,
        }
    }

    pub fn sum(&self) -> i64 {
        self.low + self.medium + self.high
    }
}

/// Aggregate counts over every stored task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total_tasks: i64,
    pub by_status: StatusCounts,
    pub by_priority: PriorityCounts,
}

impl TaskStats {
    pub fn tally<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = TaskStats::default();
        for task in tasks {
            stats.total_tasks += 1;
            stats.by_status.add(task.status, 1);
            stats.by_priority.add(task.priority, 1);
        }
        stats
    }
}

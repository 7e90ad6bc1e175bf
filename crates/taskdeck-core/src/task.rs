use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Collector, ValidationError};

pub const TITLE_MAX_LEN: usize = 200;
pub const DESCRIPTION_MAX_LEN: usize = 1000;
pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 1000;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
}

impl Status {
    pub const ALL: &[Status] = &[Status::Pending, Status::InProgress, Status::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Status::Pending),
            "in_progress" => Some(Status::InProgress),
            "completed" => Some(Status::Completed),
            _ => None,
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Pending
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: &[Priority] = &[Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated creation input. Status is not part of it: new tasks always start
/// out `pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl CreateTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: Priority::default(),
            due_date: None,
        }
    }
}

/// Validated partial update. `None` leaves a field untouched; for the nullable
/// columns `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl UpdateTask {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }

    /// Apply the supplied fields to `task` in place. Timestamps are left to
    /// the caller.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(ref title) = self.title {
            task.title = title.clone();
        }
        if let Some(ref description) = self.description {
            task.description = description.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskFilter {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            search: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl TaskFilter {
    /// Whether `task` satisfies the status, priority and search predicates.
    /// Pagination is not considered.
    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        match self.search.as_deref() {
            None => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                task.title.to_lowercase().contains(&needle)
                    || task
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            }
        }
    }
}

/// One page of a listing plus the number of rows matching the filter before
/// `limit`/`offset` were applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: i64,
}

/// Timestamp for a mutation of a row last touched at `previous`. Never equal
/// to or earlier than `previous`, even when the clock has not moved.
pub fn next_updated_at(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

// -- Untrusted input --

/// Body of `POST /api/tasks` as received. Enum and date fields stay strings
/// until `validate` so a bad value can be reported against its field name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
}

impl CreateTaskRequest {
    pub fn validate(self) -> Result<CreateTask, ValidationError> {
        let mut errors = Collector::default();

        let title = match self.title {
            Some(t) => check_title(&mut errors, t),
            None => {
                errors.push("title", "field required");
                String::new()
            }
        };
        let description = self
            .description
            .map(|d| check_description(&mut errors, d));
        let priority = match self.priority {
            Some(p) => parse_priority(&mut errors, &p),
            None => Priority::default(),
        };
        let due_date = self.due_date.and_then(|d| parse_due_date(&mut errors, &d));

        errors.finish(CreateTask {
            title,
            description,
            priority,
            due_date,
        })
    }
}

/// Body of `PUT /api/tasks/{id}` as received.
///
/// `null` on `description` or `due_date` clears the column; `null` on the
/// other fields is the same as leaving them out.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
}

impl UpdateTaskRequest {
    pub fn validate(self) -> Result<UpdateTask, ValidationError> {
        let mut errors = Collector::default();

        let title = self.title.map(|t| check_title(&mut errors, t));
        let description = self
            .description
            .map(|d| d.map(|d| check_description(&mut errors, d)));
        let status = self.status.map(|s| parse_status(&mut errors, &s));
        let priority = self.priority.map(|p| parse_priority(&mut errors, &p));
        let due_date = self
            .due_date
            .map(|d| d.and_then(|d| parse_due_date(&mut errors, &d)));

        errors.finish(UpdateTask {
            title,
            description,
            status,
            priority,
            due_date,
        })
    }
}

/// Query string of `GET /api/tasks` as received. Empty values count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListTasksQuery {
    pub fn validate(self) -> Result<TaskFilter, ValidationError> {
        let mut errors = Collector::default();

        let status = non_empty(self.status).map(|s| parse_status(&mut errors, &s));
        let priority = non_empty(self.priority).map(|p| parse_priority(&mut errors, &p));
        let search = non_empty(self.search);

        let limit = match non_empty(self.limit) {
            None => DEFAULT_PAGE_LIMIT,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(n) if (1..=MAX_PAGE_LIMIT).contains(&n) => n,
                Ok(_) => {
                    errors.push(
                        "limit",
                        format!("must be between 1 and {MAX_PAGE_LIMIT}"),
                    );
                    DEFAULT_PAGE_LIMIT
                }
                Err(_) => {
                    errors.push("limit", "must be an integer");
                    DEFAULT_PAGE_LIMIT
                }
            },
        };
        let offset = match non_empty(self.offset) {
            None => 0,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(n) if n >= 0 => n,
                Ok(_) => {
                    errors.push("offset", "must be greater than or equal to 0");
                    0
                }
                Err(_) => {
                    errors.push("offset", "must be an integer");
                    0
                }
            },
        };

        errors.finish(TaskFilter {
            status,
            priority,
            search,
            limit,
            offset,
        })
    }
}

fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn check_title(errors: &mut Collector, title: String) -> String {
    let title = title.trim().to_string();
    if title.is_empty() {
        errors.push("title", "must not be empty");
    } else if title.chars().count() > TITLE_MAX_LEN {
        errors.push(
            "title",
            format!("must be at most {TITLE_MAX_LEN} characters"),
        );
    }
    title
}

fn check_description(errors: &mut Collector, description: String) -> String {
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        errors.push(
            "description",
            format!("must be at most {DESCRIPTION_MAX_LEN} characters"),
        );
    }
    description
}

fn parse_status(errors: &mut Collector, raw: &str) -> Status {
    Status::parse_str(raw).unwrap_or_else(|| {
        errors.push("status", "must be one of: pending, in_progress, completed");
        Status::default()
    })
}

fn parse_priority(errors: &mut Collector, raw: &str) -> Priority {
    Priority::parse_str(raw).unwrap_or_else(|| {
        errors.push("priority", "must be one of: low, medium, high");
        Priority::default()
    })
}

fn parse_due_date(errors: &mut Collector, raw: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push("due_date", "must be a date in YYYY-MM-DD format");
            None
        }
    }
}

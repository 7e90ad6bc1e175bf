pub mod error;
pub mod stats;
pub mod task;

pub use error::{FieldError, ValidationError};
pub use stats::TaskStats;
pub use task::{CreateTask, Priority, Status, Task, TaskFilter, TaskPage, UpdateTask};

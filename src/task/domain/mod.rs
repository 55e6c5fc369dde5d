//! Domain model for schedulable tasks.
//!
//! Tasks carry their own lifecycle rules as pure methods; persistence and
//! scheduling live outside the domain boundary.

mod error;
mod ids;
mod kinds;
mod task;

pub use error::{ParseTaskFieldError, TaskDomainError};
pub use ids::{TaskId, WorkerId};
pub use kinds::{Criticality, TaskPriority, TaskStatus, TaskType};
pub use task::{
    DEFAULT_MAX_RETRIES, PersistedTaskData, Task, TaskDraft, TaskPayload, metadata_keys,
};

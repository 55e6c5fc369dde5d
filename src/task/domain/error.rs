//! Error types for task domain validation and parsing.

use super::{TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned by task construction and state transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The requested transition is not permitted from the current status.
    #[error("cannot {action} task {task_id} in {status} state")]
    InvalidTransition {
        /// Task identifier.
        task_id: TaskId,
        /// Status the task was in when the transition was attempted.
        status: TaskStatus,
        /// Name of the rejected transition.
        action: &'static str,
    },

    /// The task has already used every retry it is allowed.
    #[error("task {task_id} exhausted its {max_retries} retries")]
    RetriesExhausted {
        /// Task identifier.
        task_id: TaskId,
        /// Configured retry ceiling.
        max_retries: u32,
    },
}

/// Error returned while parsing task enumerations from strings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task {field}: {value}")]
pub struct ParseTaskFieldError {
    /// Field being parsed, such as `status` or `type`.
    pub field: &'static str,
    /// Rejected input.
    pub value: String,
}

impl ParseTaskFieldError {
    pub(crate) fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_owned(),
        }
    }
}

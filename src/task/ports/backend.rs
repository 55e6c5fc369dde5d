//! Storage backend port for task rows.
//!
//! The backend executes a closed set of statements. Every mutating statement
//! is a single conditional write whose filter encodes the status the task
//! must currently be in, so the affected-row count is the only signal a
//! caller needs to know whether its transition won.

use crate::task::domain::{TaskId, TaskPayload, TaskStatus, WorkerId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result type for storage backend operations.
pub type BackendResult<T> = Result<T, TaskBackendError>;

/// Minimal transactional storage contract for task rows.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Inserts a row and returns the timestamps assigned by the backend.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBackendError::DuplicateTask`] when the ID already exists.
    async fn insert(&self, record: NewTaskRecord) -> BackendResult<RecordTimestamps>;

    /// Executes a conditional statement and returns the affected-row count.
    async fn exec(&self, statement: TaskStatement) -> BackendResult<u64>;

    /// Returns every row matching the query.
    async fn query(&self, query: TaskQuery) -> BackendResult<Vec<TaskRecord>>;

    /// Returns the row with the given ID, if any.
    async fn query_row(&self, id: TaskId) -> BackendResult<Option<TaskRecord>>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> BackendResult<()>;

    /// Releases backend resources. Later calls fail with
    /// [`TaskBackendError::Closed`].
    fn close(&self);
}

/// Conditional write statements understood by every backend.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatement {
    /// `pending` → `in_progress`, optionally claiming for a worker.
    Start {
        /// Target task.
        id: TaskId,
        /// Claiming worker; also becomes the original worker if unset.
        worker: Option<WorkerId>,
    },
    /// `in_progress` → `completed` with result data.
    Complete {
        /// Target task.
        id: TaskId,
        /// Result payload.
        result: TaskPayload,
    },
    /// Any non-terminal status → `failed`.
    Fail {
        /// Target task.
        id: TaskId,
        /// Failure description.
        error: String,
    },
    /// `in_progress` → `pending` while retries remain.
    Requeue {
        /// Target task.
        id: TaskId,
        /// Failure that caused the retry.
        error: String,
    },
    /// Any non-terminal status → `cancelled`.
    Cancel {
        /// Target task.
        id: TaskId,
        /// Cancellation reason.
        reason: String,
    },
    /// Stores checkpoint data on an `in_progress` task.
    Checkpoint {
        /// Target task.
        id: TaskId,
        /// Checkpoint payload.
        data: Value,
    },
    /// Returns every assigned or running task held by a worker to `pending`.
    ReleaseWorker {
        /// Worker reported dead by the pool.
        worker: WorkerId,
    },
    /// Makes a `pending` task wait on newly created subtasks and records
    /// their IDs under `metadata.subtasks`.
    Split {
        /// Parent task.
        id: TaskId,
        /// Subtasks appended to the parent's dependencies.
        subtasks: Vec<TaskId>,
    },
    /// Removes a task that is not running.
    Delete {
        /// Target task.
        id: TaskId,
    },
}

impl TaskStatement {
    /// Returns the targeted task, or `None` for bulk statements.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Start { id, .. }
            | Self::Complete { id, .. }
            | Self::Fail { id, .. }
            | Self::Requeue { id, .. }
            | Self::Cancel { id, .. }
            | Self::Checkpoint { id, .. }
            | Self::Split { id, .. }
            | Self::Delete { id } => Some(*id),
            Self::ReleaseWorker { .. } => None,
        }
    }

    /// Describes the status the filter requires, for conflict reporting.
    #[must_use]
    pub const fn expected_state(&self) -> &'static str {
        match self {
            Self::Start { .. } | Self::Split { .. } => "pending",
            Self::Complete { .. } | Self::Checkpoint { .. } => "in_progress",
            Self::Fail { .. } | Self::Cancel { .. } => "active",
            Self::Requeue { .. } => "retryable",
            Self::ReleaseWorker { .. } => "assigned",
            Self::Delete { .. } => "deletable",
        }
    }

    /// Returns the statement name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Complete { .. } => "complete",
            Self::Fail { .. } => "fail",
            Self::Requeue { .. } => "requeue",
            Self::Cancel { .. } => "cancel",
            Self::Checkpoint { .. } => "checkpoint",
            Self::ReleaseWorker { .. } => "release_worker",
            Self::Split { .. } => "split",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Read queries returning multiple rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskQuery {
    /// All rows, newest first.
    All,
    /// Rows with the given status, newest first.
    ByStatus(TaskStatus),
}

/// JSON document stored in the `task_data` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskData {
    /// Task title.
    pub title: String,
    /// Task description.
    pub description: String,
    /// Input payload.
    pub input: TaskPayload,
    /// Runtime blockers.
    pub blocked_by: Vec<TaskId>,
    /// Free-form metadata, including transition reasons.
    pub metadata: TaskPayload,
    /// Free-form tags.
    pub tags: Vec<String>,
}

/// Task row as read from storage, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    /// Task identifier.
    pub id: TaskId,
    /// Task type string.
    pub task_type: String,
    /// Descriptive payload; see [`TaskData`].
    pub task_data: Value,
    /// Status string.
    pub status: String,
    /// Integer priority band.
    pub priority: i32,
    /// Criticality string.
    pub criticality: String,
    /// Worker currently holding the task.
    pub assigned_worker_id: Option<WorkerId>,
    /// First worker that claimed the task.
    pub original_worker_id: Option<WorkerId>,
    /// Prerequisite task identifiers.
    pub dependencies: Vec<TaskId>,
    /// Retries consumed.
    pub retry_count: i32,
    /// Retry ceiling.
    pub max_retries: i32,
    /// Last error.
    pub error_message: Option<String>,
    /// Output payload.
    pub result_data: Value,
    /// Last checkpoint, or JSON null.
    pub checkpoint_data: Value,
    /// Expected run time in seconds.
    pub estimated_duration: Option<i64>,
    /// Start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest change timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Row to insert; the backend assigns `created_at` and `updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTaskRecord {
    /// Task identifier.
    pub id: TaskId,
    /// Task type string.
    pub task_type: String,
    /// Descriptive payload; see [`TaskData`].
    pub task_data: Value,
    /// Status string.
    pub status: String,
    /// Integer priority band.
    pub priority: i32,
    /// Criticality string.
    pub criticality: String,
    /// Worker currently holding the task.
    pub assigned_worker_id: Option<WorkerId>,
    /// First worker that claimed the task.
    pub original_worker_id: Option<WorkerId>,
    /// Prerequisite task identifiers.
    pub dependencies: Vec<TaskId>,
    /// Retries consumed.
    pub retry_count: i32,
    /// Retry ceiling.
    pub max_retries: i32,
    /// Last error.
    pub error_message: Option<String>,
    /// Output payload.
    pub result_data: Value,
    /// Last checkpoint, or JSON null.
    pub checkpoint_data: Value,
    /// Expected run time in seconds.
    pub estimated_duration: Option<i64>,
    /// Start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

impl NewTaskRecord {
    /// Attaches backend-assigned timestamps to form a full row.
    #[must_use]
    pub fn into_record(self, timestamps: RecordTimestamps) -> TaskRecord {
        TaskRecord {
            id: self.id,
            task_type: self.task_type,
            task_data: self.task_data,
            status: self.status,
            priority: self.priority,
            criticality: self.criticality,
            assigned_worker_id: self.assigned_worker_id,
            original_worker_id: self.original_worker_id,
            dependencies: self.dependencies,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            error_message: self.error_message,
            result_data: self.result_data,
            checkpoint_data: self.checkpoint_data,
            estimated_duration: self.estimated_duration,
            started_at: self.started_at,
            completed_at: self.completed_at,
            created_at: timestamps.created_at,
            updated_at: timestamps.updated_at,
        }
    }
}

/// Timestamps assigned by the backend on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordTimestamps {
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest change timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Errors returned by storage backend implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskBackendError {
    /// A row with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The backend was closed.
    #[error("task backend is closed")]
    Closed,

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskBackendError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

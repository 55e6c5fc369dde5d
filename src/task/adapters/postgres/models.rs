//! Diesel row models for distributed task storage.

use super::schema::distributed_tasks;
use crate::task::{
    domain::{TaskId, WorkerId},
    ports::{NewTaskRecord, TaskRecord},
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = distributed_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: Uuid,
    /// Task type.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub task_type: String,
    /// Descriptive JSON payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub task_data: Value,
    /// Lifecycle status.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub status: String,
    /// Integer priority band.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub priority: i32,
    /// Failure impact.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub criticality: String,
    /// Worker currently holding the task.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Uuid>)]
    pub assigned_worker_id: Option<Uuid>,
    /// First worker that claimed the task.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Uuid>)]
    pub original_worker_id: Option<Uuid>,
    /// Prerequisite task identifiers.
    #[diesel(sql_type = diesel::sql_types::Array<diesel::sql_types::Uuid>)]
    pub dependencies: Vec<Uuid>,
    /// Retries consumed.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub retry_count: i32,
    /// Retry ceiling.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub max_retries: i32,
    /// Last error.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub error_message: Option<String>,
    /// Output payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub result_data: Value,
    /// Last checkpoint.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub checkpoint_data: Value,
    /// Expected run time in seconds.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Int8>)]
    pub estimated_duration: Option<i64>,
    /// Start timestamp.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

/// Insert model for task records; timestamps come from column defaults.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = distributed_tasks)]
pub struct NewTaskRow {
    /// Task identifier.
    pub id: Uuid,
    /// Task type.
    pub task_type: String,
    /// Descriptive JSON payload.
    pub task_data: Value,
    /// Lifecycle status.
    pub status: String,
    /// Integer priority band.
    pub priority: i32,
    /// Failure impact.
    pub criticality: String,
    /// Worker currently holding the task.
    pub assigned_worker_id: Option<Uuid>,
    /// First worker that claimed the task.
    pub original_worker_id: Option<Uuid>,
    /// Prerequisite task identifiers.
    pub dependencies: Vec<Uuid>,
    /// Retries consumed.
    pub retry_count: i32,
    /// Retry ceiling.
    pub max_retries: i32,
    /// Last error.
    pub error_message: Option<String>,
    /// Output payload.
    pub result_data: Value,
    /// Last checkpoint.
    pub checkpoint_data: Value,
    /// Expected run time in seconds.
    pub estimated_duration: Option<i64>,
    /// Start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<NewTaskRecord> for NewTaskRow {
    fn from(record: NewTaskRecord) -> Self {
        Self {
            id: record.id.into_inner(),
            task_type: record.task_type,
            task_data: record.task_data,
            status: record.status,
            priority: record.priority,
            criticality: record.criticality,
            assigned_worker_id: record.assigned_worker_id.map(WorkerId::into_inner),
            original_worker_id: record.original_worker_id.map(WorkerId::into_inner),
            dependencies: record
                .dependencies
                .into_iter()
                .map(TaskId::into_inner)
                .collect(),
            retry_count: record.retry_count,
            max_retries: record.max_retries,
            error_message: record.error_message,
            result_data: record.result_data,
            checkpoint_data: record.checkpoint_data,
            estimated_duration: record.estimated_duration,
            started_at: record.started_at,
            completed_at: record.completed_at,
        }
    }
}

impl From<TaskRow> for TaskRecord {
    fn from(row: TaskRow) -> Self {
        Self {
            id: TaskId::from_uuid(row.id),
            task_type: row.task_type,
            task_data: row.task_data,
            status: row.status,
            priority: row.priority,
            criticality: row.criticality,
            assigned_worker_id: row.assigned_worker_id.map(WorkerId::from_uuid),
            original_worker_id: row.original_worker_id.map(WorkerId::from_uuid),
            dependencies: row.dependencies.into_iter().map(TaskId::from_uuid).collect(),
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            error_message: row.error_message,
            result_data: row.result_data,
            checkpoint_data: row.checkpoint_data,
            estimated_duration: row.estimated_duration,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

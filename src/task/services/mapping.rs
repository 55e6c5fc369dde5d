//! Conversion between task entities and storage rows.

use super::store::TaskStoreError;
use crate::task::{
    domain::{Criticality, PersistedTaskData, Task, TaskPayload, TaskPriority, TaskStatus, TaskType},
    ports::{NewTaskRecord, TaskBackendError, TaskData, TaskRecord},
};
use serde_json::Value;
use std::time::Duration;

/// Builds the insert row for a task. Timestamps are left to the backend.
pub(super) fn to_new_record(task: Task) -> Result<NewTaskRecord, TaskStoreError> {
    let data = task.into_persisted();
    let document = TaskData {
        title: data.title,
        description: data.description,
        input: data.input,
        blocked_by: data.blocked_by,
        metadata: data.metadata,
        tags: data.tags,
    };
    let task_data = serde_json::to_value(&document).map_err(TaskBackendError::persistence)?;

    Ok(NewTaskRecord {
        id: data.id,
        task_type: data.task_type.as_str().to_owned(),
        task_data,
        status: data.status.as_str().to_owned(),
        priority: data.priority.band(),
        criticality: data.criticality.as_str().to_owned(),
        assigned_worker_id: data.assigned_to,
        original_worker_id: data.original_worker,
        dependencies: data.depends_on,
        retry_count: saturating_i32(data.retry_count),
        max_retries: saturating_i32(data.max_retries),
        error_message: data.error_message,
        result_data: Value::Object(data.output),
        checkpoint_data: data.checkpoint.unwrap_or(Value::Null),
        estimated_duration: data
            .estimated_duration
            .and_then(|estimate| i64::try_from(estimate.as_secs()).ok()),
        started_at: data.started_at,
        completed_at: data.completed_at,
    })
}

/// Rebuilds a task from a stored row.
pub(super) fn from_record(record: TaskRecord) -> Result<Task, TaskStoreError> {
    let id = record.id;
    let corrupt = |reason: String| TaskStoreError::CorruptRow { id, reason };

    let task_type =
        TaskType::try_from(record.task_type.as_str()).map_err(|err| corrupt(err.to_string()))?;
    let status =
        TaskStatus::try_from(record.status.as_str()).map_err(|err| corrupt(err.to_string()))?;
    let criticality = Criticality::try_from(record.criticality.as_str()).unwrap_or_default();
    let document: TaskData =
        serde_json::from_value(record.task_data).map_err(|err| corrupt(err.to_string()))?;

    Ok(Task::from_persisted(PersistedTaskData {
        id,
        task_type,
        title: document.title,
        description: document.description,
        status,
        priority: TaskPriority::from_band(record.priority),
        criticality,
        depends_on: record.dependencies,
        blocked_by: document.blocked_by,
        input: document.input,
        output: into_payload(record.result_data),
        assigned_to: record.assigned_worker_id,
        original_worker: record.original_worker_id,
        retry_count: u32::try_from(record.retry_count).unwrap_or_default(),
        max_retries: u32::try_from(record.max_retries).unwrap_or_default(),
        error_message: record.error_message,
        checkpoint: Some(record.checkpoint_data).filter(|value| !value.is_null()),
        estimated_duration: record
            .estimated_duration
            .and_then(|seconds| u64::try_from(seconds).ok())
            .map(Duration::from_secs),
        metadata: document.metadata,
        tags: document.tags,
        created_at: record.created_at,
        updated_at: record.updated_at,
        started_at: record.started_at,
        completed_at: record.completed_at,
    }))
}

fn into_payload(value: Value) -> TaskPayload {
    match value {
        Value::Object(map) => map,
        _ => TaskPayload::new(),
    }
}

fn saturating_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

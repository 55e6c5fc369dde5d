//! In-memory storage backend for task rows.
//!
//! Each statement runs under one write lock, which gives the same
//! statement-level atomicity the `PostgreSQL` backend relies on.

use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{TaskId, TaskStatus, metadata_keys},
    ports::{
        BackendResult, NewTaskRecord, RecordTimestamps, TaskBackend, TaskBackendError, TaskQuery,
        TaskRecord, TaskStatement,
    },
};

/// Thread-safe in-memory task backend.
#[derive(Debug, Clone)]
pub struct InMemoryTaskBackend<C = DefaultClock> {
    state: Arc<RwLock<InMemoryTaskState>>,
    clock: Arc<C>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    rows: HashMap<TaskId, TaskRecord>,
    closed: bool,
}

impl InMemoryTaskBackend<DefaultClock> {
    /// Creates an empty backend stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }
}

impl Default for InMemoryTaskBackend<DefaultClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> InMemoryTaskBackend<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty backend stamped by the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<C>) -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryTaskState::default())),
            clock,
        }
    }

    fn write_state(&self) -> BackendResult<std::sync::RwLockWriteGuard<'_, InMemoryTaskState>> {
        let state = self
            .state
            .write()
            .map_err(|err| TaskBackendError::persistence(std::io::Error::other(err.to_string())))?;
        if state.closed {
            return Err(TaskBackendError::Closed);
        }
        Ok(state)
    }

    fn read_state(&self) -> BackendResult<std::sync::RwLockReadGuard<'_, InMemoryTaskState>> {
        let state = self
            .state
            .read()
            .map_err(|err| TaskBackendError::persistence(std::io::Error::other(err.to_string())))?;
        if state.closed {
            return Err(TaskBackendError::Closed);
        }
        Ok(state)
    }
}

fn status_of(row: &TaskRecord) -> Option<TaskStatus> {
    TaskStatus::try_from(row.status.as_str()).ok()
}

fn has_status(row: &TaskRecord, expected: TaskStatus) -> bool {
    status_of(row) == Some(expected)
}

fn is_active(row: &TaskRecord) -> bool {
    status_of(row).is_some_and(|status| !status.is_terminal())
}

fn set_status(row: &mut TaskRecord, status: TaskStatus) {
    status.as_str().clone_into(&mut row.status);
}

fn metadata_mut(task_data: &mut Value) -> Option<&mut serde_json::Map<String, Value>> {
    task_data
        .as_object_mut()?
        .entry("metadata")
        .or_insert_with(|| Value::Object(serde_json::Map::new()))
        .as_object_mut()
}

/// Records a reason and its RFC 3339 timestamp under `task_data.metadata`,
/// matching what the domain writes for the same transition.
fn record_metadata_reason(
    task_data: &mut Value,
    (reason_key, at_key): (&str, &str),
    reason: &str,
    at: chrono::DateTime<chrono::Utc>,
) {
    if let Some(map) = metadata_mut(task_data) {
        map.insert(reason_key.to_owned(), Value::String(reason.to_owned()));
        map.insert(at_key.to_owned(), Value::String(at.to_rfc3339()));
    }
}

/// Applies a single-row conditional update, returning the affected count.
fn update_where(
    rows: &mut HashMap<TaskId, TaskRecord>,
    id: TaskId,
    guard: impl FnOnce(&TaskRecord) -> bool,
    apply: impl FnOnce(&mut TaskRecord),
) -> u64 {
    match rows.get_mut(&id) {
        Some(row) if guard(row) => {
            apply(row);
            1
        }
        _ => 0,
    }
}

fn apply_statement(
    rows: &mut HashMap<TaskId, TaskRecord>,
    statement: TaskStatement,
    now: chrono::DateTime<chrono::Utc>,
) -> u64 {
    match statement {
        TaskStatement::Start { id, worker } => update_where(
            rows,
            id,
            |row| has_status(row, TaskStatus::Pending),
            |row| {
                set_status(row, TaskStatus::InProgress);
                if let Some(worker_id) = worker {
                    row.assigned_worker_id = Some(worker_id);
                    row.original_worker_id.get_or_insert(worker_id);
                }
                row.started_at = Some(now);
                row.updated_at = now;
            },
        ),
        TaskStatement::Complete { id, result } => update_where(
            rows,
            id,
            |row| has_status(row, TaskStatus::InProgress),
            |row| {
                set_status(row, TaskStatus::Completed);
                row.result_data = Value::Object(result);
                row.completed_at = Some(now);
                row.updated_at = now;
            },
        ),
        TaskStatement::Fail { id, error } => update_where(rows, id, is_active, |row| {
            set_status(row, TaskStatus::Failed);
            record_metadata_reason(
                &mut row.task_data,
                (metadata_keys::FAILURE_REASON, metadata_keys::FAILED_AT),
                &error,
                now,
            );
            row.error_message = Some(error);
            row.updated_at = now;
        }),
        TaskStatement::Requeue { id, error } => update_where(
            rows,
            id,
            |row| has_status(row, TaskStatus::InProgress) && row.retry_count < row.max_retries,
            |row| {
                set_status(row, TaskStatus::Pending);
                row.retry_count = row.retry_count.saturating_add(1);
                row.assigned_worker_id = None;
                row.error_message = Some(error);
                row.updated_at = now;
            },
        ),
        TaskStatement::Cancel { id, reason } => update_where(rows, id, is_active, |row| {
            set_status(row, TaskStatus::Cancelled);
            record_metadata_reason(
                &mut row.task_data,
                (metadata_keys::CANCELLATION_REASON, metadata_keys::CANCELLED_AT),
                &reason,
                now,
            );
            row.updated_at = now;
        }),
        TaskStatement::Checkpoint { id, data } => update_where(
            rows,
            id,
            |row| has_status(row, TaskStatus::InProgress),
            |row| {
                row.checkpoint_data = data;
                row.updated_at = now;
            },
        ),
        TaskStatement::ReleaseWorker { worker } => {
            let mut released = 0;
            for row in rows.values_mut() {
                let held = row.assigned_worker_id == Some(worker)
                    && matches!(
                        status_of(row),
                        Some(TaskStatus::Assigned | TaskStatus::InProgress)
                    );
                if held {
                    set_status(row, TaskStatus::Pending);
                    row.assigned_worker_id = None;
                    row.updated_at = now;
                    released += 1;
                }
            }
            released
        }
        TaskStatement::Split { id, subtasks } => update_where(
            rows,
            id,
            |row| has_status(row, TaskStatus::Pending),
            |row| {
                let recorded = subtasks
                    .iter()
                    .map(|subtask| Value::String(subtask.to_string()))
                    .collect();
                if let Some(map) = metadata_mut(&mut row.task_data) {
                    map.insert(metadata_keys::SUBTASKS.to_owned(), Value::Array(recorded));
                }
                row.dependencies.extend(subtasks);
                row.updated_at = now;
            },
        ),
        TaskStatement::Delete { id } => {
            let deletable = rows
                .get(&id)
                .is_some_and(|row| !has_status(row, TaskStatus::InProgress));
            if deletable {
                rows.remove(&id);
                1
            } else {
                0
            }
        }
    }
}

#[async_trait]
impl<C> TaskBackend for InMemoryTaskBackend<C>
where
    C: Clock + Send + Sync,
{
    async fn insert(&self, record: NewTaskRecord) -> BackendResult<RecordTimestamps> {
        let mut state = self.write_state()?;
        if state.rows.contains_key(&record.id) {
            return Err(TaskBackendError::DuplicateTask(record.id));
        }
        let now = self.clock.utc();
        let timestamps = RecordTimestamps {
            created_at: now,
            updated_at: now,
        };
        state.rows.insert(record.id, record.into_record(timestamps));
        Ok(timestamps)
    }

    async fn exec(&self, statement: TaskStatement) -> BackendResult<u64> {
        let mut state = self.write_state()?;
        let now = self.clock.utc();
        Ok(apply_statement(&mut state.rows, statement, now))
    }

    async fn query(&self, query: TaskQuery) -> BackendResult<Vec<TaskRecord>> {
        let state = self.read_state()?;
        let mut rows: Vec<TaskRecord> = state
            .rows
            .values()
            .filter(|row| match query {
                TaskQuery::All => true,
                TaskQuery::ByStatus(status) => has_status(row, status),
            })
            .cloned()
            .collect();
        rows.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(rows)
    }

    async fn query_row(&self, id: TaskId) -> BackendResult<Option<TaskRecord>> {
        let state = self.read_state()?;
        Ok(state.rows.get(&id).cloned())
    }

    async fn ping(&self) -> BackendResult<()> {
        self.read_state().map(|_| ())
    }

    fn close(&self) {
        if let Ok(mut state) = self.state.write() {
            state.closed = true;
        }
    }
}

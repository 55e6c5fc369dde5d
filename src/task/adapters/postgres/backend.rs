//! `PostgreSQL` storage backend for distributed task rows.

use super::{
    models::{NewTaskRow, TaskRow},
    schema::distributed_tasks,
};
use crate::task::{
    domain::{TaskId, WorkerId},
    ports::{
        BackendResult, NewTaskRecord, RecordTimestamps, TaskBackend, TaskBackendError, TaskQuery,
        TaskRecord, TaskStatement,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Array, Jsonb, Nullable, Text, Uuid as SqlUuid};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

const START_SQL: &str = concat!(
    "UPDATE distributed_tasks SET status = 'in_progress', ",
    "assigned_worker_id = COALESCE($2, assigned_worker_id), ",
    "original_worker_id = COALESCE(original_worker_id, $2), ",
    "started_at = NOW(), updated_at = NOW() ",
    "WHERE id = $1 AND status = 'pending'",
);

const COMPLETE_SQL: &str = concat!(
    "UPDATE distributed_tasks SET status = 'completed', result_data = $2, ",
    "completed_at = NOW(), updated_at = NOW() ",
    "WHERE id = $1 AND status = 'in_progress'",
);

const FAIL_SQL: &str = concat!(
    "UPDATE distributed_tasks SET status = 'failed', error_message = $2, ",
    "task_data = jsonb_set(",
    "jsonb_set(task_data, '{metadata,failure_reason}', to_jsonb($2::text), true), ",
    "'{metadata,failed_at}', to_jsonb(NOW()), true), ",
    "updated_at = NOW() ",
    "WHERE id = $1 AND status NOT IN ('completed', 'failed', 'cancelled')",
);

const REQUEUE_SQL: &str = concat!(
    "UPDATE distributed_tasks SET status = 'pending', retry_count = retry_count + 1, ",
    "assigned_worker_id = NULL, error_message = $2, updated_at = NOW() ",
    "WHERE id = $1 AND status = 'in_progress' AND retry_count < max_retries",
);

const CANCEL_SQL: &str = concat!(
    "UPDATE distributed_tasks SET status = 'cancelled', ",
    "task_data = jsonb_set(",
    "jsonb_set(task_data, '{metadata,cancellation_reason}', to_jsonb($2::text), true), ",
    "'{metadata,cancelled_at}', to_jsonb(NOW()), true), ",
    "updated_at = NOW() ",
    "WHERE id = $1 AND status NOT IN ('completed', 'failed', 'cancelled')",
);

const CHECKPOINT_SQL: &str = concat!(
    "UPDATE distributed_tasks SET checkpoint_data = $2, updated_at = NOW() ",
    "WHERE id = $1 AND status = 'in_progress'",
);

const RELEASE_WORKER_SQL: &str = concat!(
    "UPDATE distributed_tasks SET status = 'pending', assigned_worker_id = NULL, ",
    "updated_at = NOW() ",
    "WHERE assigned_worker_id = $1 AND status IN ('assigned', 'in_progress')",
);

const SPLIT_SQL: &str = concat!(
    "UPDATE distributed_tasks SET dependencies = dependencies || $2, ",
    "task_data = jsonb_set(task_data, '{metadata,subtasks}', $3, true), ",
    "updated_at = NOW() ",
    "WHERE id = $1 AND status = 'pending'",
);

const DELETE_SQL: &str = "DELETE FROM distributed_tasks WHERE id = $1 AND status <> 'in_progress'";

/// `PostgreSQL`-backed task storage.
#[derive(Debug, Clone)]
pub struct PostgresTaskBackend {
    pool: TaskPgPool,
    closed: Arc<AtomicBool>,
}

impl PostgresTaskBackend {
    /// Creates a backend from a `PostgreSQL` connection pool.
    #[must_use]
    pub fn new(pool: TaskPgPool) -> Self {
        Self {
            pool,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn run_blocking<F, T>(&self, f: F) -> BackendResult<T>
    where
        F: FnOnce(&mut PgConnection) -> BackendResult<T> + Send + 'static,
        T: Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(TaskBackendError::Closed);
        }
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskBackendError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskBackendError::persistence)?
    }
}

#[async_trait]
impl TaskBackend for PostgresTaskBackend {
    async fn insert(&self, record: NewTaskRecord) -> BackendResult<RecordTimestamps> {
        let task_id = record.id;
        let new_row = NewTaskRow::from(record);
        self.run_blocking(move |connection| {
            let (created_at, updated_at) = diesel::insert_into(distributed_tasks::table)
                .values(&new_row)
                .returning((distributed_tasks::created_at, distributed_tasks::updated_at))
                .get_result::<(DateTime<Utc>, DateTime<Utc>)>(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TaskBackendError::DuplicateTask(task_id)
                    }
                    _ => TaskBackendError::persistence(err),
                })?;
            Ok(RecordTimestamps {
                created_at,
                updated_at,
            })
        })
        .await
    }

    async fn exec(&self, statement: TaskStatement) -> BackendResult<u64> {
        tracing::debug!(statement = statement.name(), "executing task statement");
        self.run_blocking(move |connection| {
            let affected = execute_statement(connection, statement)
                .map_err(TaskBackendError::persistence)?;
            u64::try_from(affected).map_err(TaskBackendError::persistence)
        })
        .await
    }

    async fn query(&self, query: TaskQuery) -> BackendResult<Vec<TaskRecord>> {
        self.run_blocking(move |connection| {
            let rows = match query {
                TaskQuery::All => distributed_tasks::table
                    .order(distributed_tasks::created_at.desc())
                    .select(TaskRow::as_select())
                    .load::<TaskRow>(connection),
                TaskQuery::ByStatus(status) => distributed_tasks::table
                    .filter(distributed_tasks::status.eq(status.as_str()))
                    .order(distributed_tasks::created_at.desc())
                    .select(TaskRow::as_select())
                    .load::<TaskRow>(connection),
            }
            .map_err(TaskBackendError::persistence)?;
            Ok(rows.into_iter().map(TaskRecord::from).collect())
        })
        .await
    }

    async fn query_row(&self, id: TaskId) -> BackendResult<Option<TaskRecord>> {
        self.run_blocking(move |connection| {
            let row = distributed_tasks::table
                .filter(distributed_tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskBackendError::persistence)?;
            Ok(row.map(TaskRecord::from))
        })
        .await
    }

    async fn ping(&self) -> BackendResult<()> {
        self.run_blocking(|connection| {
            diesel::sql_query("SELECT 1")
                .execute(connection)
                .map(|_| ())
                .map_err(TaskBackendError::persistence)
        })
        .await
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

fn execute_statement(
    connection: &mut PgConnection,
    statement: TaskStatement,
) -> Result<usize, DieselError> {
    match statement {
        TaskStatement::Start { id, worker } => diesel::sql_query(START_SQL)
            .bind::<SqlUuid, _>(id.into_inner())
            .bind::<Nullable<SqlUuid>, _>(worker.map(WorkerId::into_inner))
            .execute(connection),
        TaskStatement::Complete { id, result } => diesel::sql_query(COMPLETE_SQL)
            .bind::<SqlUuid, _>(id.into_inner())
            .bind::<Jsonb, _>(Value::Object(result))
            .execute(connection),
        TaskStatement::Fail { id, error } => diesel::sql_query(FAIL_SQL)
            .bind::<SqlUuid, _>(id.into_inner())
            .bind::<Text, _>(error)
            .execute(connection),
        TaskStatement::Requeue { id, error } => diesel::sql_query(REQUEUE_SQL)
            .bind::<SqlUuid, _>(id.into_inner())
            .bind::<Text, _>(error)
            .execute(connection),
        TaskStatement::Cancel { id, reason } => diesel::sql_query(CANCEL_SQL)
            .bind::<SqlUuid, _>(id.into_inner())
            .bind::<Text, _>(reason)
            .execute(connection),
        TaskStatement::Checkpoint { id, data } => diesel::sql_query(CHECKPOINT_SQL)
            .bind::<SqlUuid, _>(id.into_inner())
            .bind::<Jsonb, _>(data)
            .execute(connection),
        TaskStatement::ReleaseWorker { worker } => diesel::sql_query(RELEASE_WORKER_SQL)
            .bind::<SqlUuid, _>(worker.into_inner())
            .execute(connection),
        TaskStatement::Split { id, subtasks } => {
            let recorded = subtasks
                .iter()
                .map(|subtask| Value::String(subtask.to_string()))
                .collect();
            diesel::sql_query(SPLIT_SQL)
                .bind::<SqlUuid, _>(id.into_inner())
                .bind::<Array<SqlUuid>, _>(
                    subtasks
                        .into_iter()
                        .map(TaskId::into_inner)
                        .collect::<Vec<_>>(),
                )
                .bind::<Jsonb, _>(Value::Array(recorded))
                .execute(connection)
        }
        TaskStatement::Delete { id } => diesel::sql_query(DELETE_SQL)
            .bind::<SqlUuid, _>(id.into_inner())
            .execute(connection),
    }
}

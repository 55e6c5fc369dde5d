//! Durable task store built on conditional backend statements.
//!
//! Every transition is a single statement whose filter names the status the
//! task must be in. The store never reads a row, mutates it locally, and
//! writes it back: the affected-row count decides who won.

use super::mapping::{from_record, to_new_record};
use crate::task::{
    domain::{
        Criticality, ParseTaskFieldError, Task, TaskDomainError, TaskDraft, TaskId, TaskPayload,
        TaskPriority, TaskStatus, TaskType, WorkerId,
    },
    ports::{TaskBackend, TaskBackendError, TaskQuery, TaskStatement},
};
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Request payload for creating a task from caller-supplied strings.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTaskRequest {
    title: String,
    description: String,
    task_type: String,
    priority: String,
    criticality: Option<String>,
    input: TaskPayload,
    dependencies: Vec<TaskId>,
    max_retries: Option<u32>,
    estimated_duration: Option<Duration>,
    tags: Vec<String>,
}

impl CreateTaskRequest {
    /// Creates a request with the required fields.
    ///
    /// An empty priority selects the default.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        task_type: impl Into<String>,
        priority: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            task_type: task_type.into(),
            priority: priority.into(),
            criticality: None,
            input: TaskPayload::new(),
            dependencies: Vec::new(),
            max_retries: None,
            estimated_duration: None,
            tags: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the criticality.
    #[must_use]
    pub fn with_criticality(mut self, criticality: impl Into<String>) -> Self {
        self.criticality = Some(criticality.into());
        self
    }

    /// Sets the input parameters.
    #[must_use]
    pub fn with_input(mut self, input: TaskPayload) -> Self {
        self.input = input;
        self
    }

    /// Sets prerequisite task identifiers.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }

    /// Overrides the store's default retry ceiling.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the expected run time.
    #[must_use]
    pub const fn with_estimated_duration(mut self, estimate: Duration) -> Self {
        self.estimated_duration = Some(estimate);
        self
    }

    /// Sets free-form tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }
}

/// One child of [`TaskStore::split_task`].
///
/// Type, priority, criticality, retries, and tags come from the parent.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtaskRequest {
    title: String,
    description: String,
    input: TaskPayload,
    dependencies: Vec<TaskId>,
}

impl SubtaskRequest {
    /// Creates a subtask request with a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            input: TaskPayload::new(),
            dependencies: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the input parameters.
    #[must_use]
    pub fn with_input(mut self, input: TaskPayload) -> Self {
        self.input = input;
        self
    }

    /// Adds prerequisites beyond the ones inherited from the parent.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }
}

/// Outcome of [`TaskStore::fail_or_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The task returned to `pending` for another attempt.
    Requeued,
    /// The task had no retries left and is now `failed`.
    Failed,
}

/// Errors returned by task store operations.
#[derive(Debug, Error)]
pub enum TaskStoreError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// A type, status, or priority string was not recognised.
    #[error(transparent)]
    InvalidField(#[from] ParseTaskFieldError),

    /// No task exists with the identifier.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The conditional statement affected no rows.
    ///
    /// Covers both a missing row and a row in the wrong state; callers must
    /// re-fetch before deciding whether to retry.
    #[error("task not found or not in {expected} state: {id}")]
    Conflict {
        /// Targeted task.
        id: TaskId,
        /// Status the statement required.
        expected: &'static str,
    },

    /// A split request was rejected before anything was written.
    #[error("cannot split task {id}: {reason}")]
    InvalidSplit {
        /// Parent task.
        id: TaskId,
        /// Why the split was rejected.
        reason: &'static str,
    },

    /// A stored row could not be decoded.
    #[error("corrupt task row {id}: {reason}")]
    CorruptRow {
        /// Row identifier.
        id: TaskId,
        /// Decoding failure.
        reason: String,
    },

    /// Backend failure.
    #[error(transparent)]
    Backend(#[from] TaskBackendError),
}

impl TaskStoreError {
    /// Returns `true` for input errors that retrying cannot fix.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Domain(_) | Self::InvalidField(_) | Self::InvalidSplit { .. }
        )
    }

    /// Returns `true` when a conditional transition lost.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Durable task store.
#[derive(Clone)]
pub struct TaskStore<B, C>
where
    B: TaskBackend,
    C: Clock + Send + Sync,
{
    backend: Arc<B>,
    clock: Arc<C>,
    default_max_retries: u32,
}

impl<B, C> TaskStore<B, C>
where
    B: TaskBackend,
    C: Clock + Send + Sync,
{
    /// Creates a store over a backend.
    #[must_use]
    pub const fn new(backend: Arc<B>, clock: Arc<C>) -> Self {
        Self {
            backend,
            clock,
            default_max_retries: crate::task::domain::DEFAULT_MAX_RETRIES,
        }
    }

    /// Overrides the retry ceiling applied when requests omit one.
    #[must_use]
    pub const fn with_default_max_retries(mut self, max_retries: u32) -> Self {
        self.default_max_retries = max_retries;
        self
    }

    /// Creates a pending task and returns it with backend timestamps.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown type, priority, or criticality
    /// strings and blank titles, or a backend error.
    pub async fn create_task(&self, request: CreateTaskRequest) -> TaskStoreResult<Task> {
        let task_type = TaskType::try_from(request.task_type.as_str())?;
        let priority = TaskPriority::parse_or_default(&request.priority)?;
        let criticality = request
            .criticality
            .as_deref()
            .map(Criticality::try_from)
            .transpose()?
            .unwrap_or_default();

        let mut draft = TaskDraft::new(task_type, request.title)
            .with_description(request.description)
            .with_priority(priority)
            .with_criticality(criticality)
            .with_dependencies(request.dependencies)
            .with_input(request.input)
            .with_max_retries(request.max_retries.unwrap_or(self.default_max_retries))
            .with_tags(request.tags);
        if let Some(estimate) = request.estimated_duration {
            draft = draft.with_estimated_duration(estimate);
        }

        let task = Task::new(draft, &*self.clock)?;
        let stored = self.insert(task).await?;
        tracing::debug!(task_id = %stored.id(), task_type = %task_type, "task created");
        Ok(stored)
    }

    /// Inserts a previously exported task with every field preserved except
    /// the backend-assigned timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`TaskBackendError::DuplicateTask`] when the ID exists.
    pub async fn import_task(&self, task: Task) -> TaskStoreResult<Task> {
        self.insert(task).await
    }

    /// Fetches a task by ID.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when no row exists.
    pub async fn get_task(&self, id: TaskId) -> TaskStoreResult<Task> {
        let record = self
            .backend
            .query_row(id)
            .await?
            .ok_or(TaskStoreError::NotFound(id))?;
        from_record(record)
    }

    /// Lists every task, newest first.
    ///
    /// # Errors
    ///
    /// Returns backend or row-decoding errors.
    pub async fn list_tasks(&self) -> TaskStoreResult<Vec<Task>> {
        self.query(TaskQuery::All).await
    }

    /// Lists tasks in the given status, newest first.
    ///
    /// # Errors
    ///
    /// Returns backend or row-decoding errors.
    pub async fn list_tasks_by_status(&self, status: TaskStatus) -> TaskStoreResult<Vec<Task>> {
        self.query(TaskQuery::ByStatus(status)).await
    }

    /// Moves a pending task to `in_progress`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Conflict`] unless the task exists and is
    /// pending.
    pub async fn start_task(&self, id: TaskId) -> TaskStoreResult<()> {
        self.transition(TaskStatement::Start { id, worker: None })
            .await
    }

    /// Claims a pending task for a worker and starts it.
    ///
    /// At most one concurrent claim on the same task succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Conflict`] unless the task exists and is
    /// pending.
    pub async fn claim_task(&self, id: TaskId, worker: WorkerId) -> TaskStoreResult<()> {
        self.transition(TaskStatement::Start {
            id,
            worker: Some(worker),
        })
        .await
    }

    /// Completes a running task with its result.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Conflict`] unless the task is in progress.
    pub async fn complete_task(&self, id: TaskId, result: TaskPayload) -> TaskStoreResult<()> {
        self.transition(TaskStatement::Complete { id, result }).await
    }

    /// Marks a non-terminal task failed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Conflict`] when the task is missing or
    /// already terminal.
    pub async fn fail_task(&self, id: TaskId, error: &str) -> TaskStoreResult<()> {
        self.transition(TaskStatement::Fail {
            id,
            error: error.to_owned(),
        })
        .await
    }

    /// Requeues a running task when retries remain, otherwise fails it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Conflict`] when neither statement applies.
    pub async fn fail_or_retry(&self, id: TaskId, error: &str) -> TaskStoreResult<RetryDecision> {
        let requeued = self
            .backend
            .exec(TaskStatement::Requeue {
                id,
                error: error.to_owned(),
            })
            .await?;
        if requeued > 0 {
            tracing::info!(task_id = %id, "task requeued after failure");
            return Ok(RetryDecision::Requeued);
        }
        self.fail_task(id, error).await?;
        tracing::warn!(task_id = %id, error, "task failed permanently");
        Ok(RetryDecision::Failed)
    }

    /// Cancels a non-terminal task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Conflict`] when the task is missing or
    /// already terminal.
    pub async fn cancel_task(&self, id: TaskId, reason: &str) -> TaskStoreResult<()> {
        self.transition(TaskStatement::Cancel {
            id,
            reason: reason.to_owned(),
        })
        .await
    }

    /// Saves checkpoint data on a running task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Conflict`] unless the task is in progress.
    pub async fn checkpoint_task(&self, id: TaskId, data: Value) -> TaskStoreResult<()> {
        self.transition(TaskStatement::Checkpoint { id, data }).await
    }

    /// Returns every task held by a dead worker to `pending`.
    ///
    /// Returns the number of released tasks.
    ///
    /// # Errors
    ///
    /// Returns backend errors.
    pub async fn release_worker(&self, worker: WorkerId) -> TaskStoreResult<u64> {
        let released = self
            .backend
            .exec(TaskStatement::ReleaseWorker { worker })
            .await?;
        if released > 0 {
            tracing::warn!(worker_id = %worker, released, "released tasks held by lost worker");
        }
        Ok(released)
    }

    /// Splits a pending task into subtasks.
    ///
    /// Each child inherits the parent's prerequisites plus its own. The
    /// parent then depends on every child, so it and anything waiting on it
    /// stay unready until the children complete. Children are removed again
    /// when the parent left `pending` in the meantime.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] for an unknown parent,
    /// [`TaskStoreError::InvalidSplit`] for an empty list or a child that
    /// names the parent as a prerequisite, and [`TaskStoreError::Conflict`]
    /// when the parent is not pending.
    pub async fn split_task(
        &self,
        parent_id: TaskId,
        subtasks: Vec<SubtaskRequest>,
    ) -> TaskStoreResult<Vec<Task>> {
        let parent = self.get_task(parent_id).await?;
        if subtasks.is_empty() {
            return Err(TaskStoreError::InvalidSplit {
                id: parent_id,
                reason: "no subtasks given",
            });
        }
        if subtasks
            .iter()
            .any(|subtask| subtask.dependencies.contains(&parent_id))
        {
            return Err(TaskStoreError::InvalidSplit {
                id: parent_id,
                reason: "a subtask cannot depend on its parent",
            });
        }
        if parent.status() != TaskStatus::Pending {
            return Err(TaskStoreError::Conflict {
                id: parent_id,
                expected: "pending",
            });
        }

        let mut children = Vec::with_capacity(subtasks.len());
        for subtask in subtasks {
            match self.insert_subtask(&parent, subtask).await {
                Ok(child) => children.push(child),
                Err(err) => {
                    self.discard(&children).await;
                    return Err(err);
                }
            }
        }

        let statement = TaskStatement::Split {
            id: parent_id,
            subtasks: children.iter().map(Task::id).collect(),
        };
        if let Err(err) = self.transition(statement).await {
            self.discard(&children).await;
            return Err(err);
        }
        tracing::info!(task_id = %parent_id, subtasks = children.len(), "task split");
        Ok(children)
    }

    /// Deletes a task that is not running.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Conflict`] when the task is missing or in
    /// progress.
    pub async fn delete_task(&self, id: TaskId) -> TaskStoreResult<()> {
        self.transition(TaskStatement::Delete { id }).await
    }

    /// Checks backend reachability.
    ///
    /// # Errors
    ///
    /// Returns backend errors.
    pub async fn ping(&self) -> TaskStoreResult<()> {
        Ok(self.backend.ping().await?)
    }

    /// Closes the backend.
    pub fn close(&self) {
        self.backend.close();
    }

    async fn insert(&self, task: Task) -> TaskStoreResult<Task> {
        let record = to_new_record(task)?;
        let timestamps = self.backend.insert(record.clone()).await?;
        from_record(record.into_record(timestamps))
    }

    async fn insert_subtask(
        &self,
        parent: &Task,
        subtask: SubtaskRequest,
    ) -> TaskStoreResult<Task> {
        let mut dependencies = parent.depends_on().to_vec();
        for dependency in subtask.dependencies {
            if !dependencies.contains(&dependency) {
                dependencies.push(dependency);
            }
        }
        let mut draft = TaskDraft::new(parent.task_type(), subtask.title)
            .with_description(subtask.description)
            .with_priority(parent.priority())
            .with_criticality(parent.criticality())
            .with_dependencies(dependencies)
            .with_input(subtask.input)
            .with_max_retries(parent.max_retries())
            .with_tags(parent.tags().to_vec());
        if let Some(estimate) = parent.estimated_duration() {
            draft = draft.with_estimated_duration(estimate);
        }
        self.insert(Task::new(draft, &*self.clock)?).await
    }

    async fn discard(&self, children: &[Task]) {
        for child in children {
            let removed = self
                .transition(TaskStatement::Delete { id: child.id() })
                .await;
            if let Err(err) = removed {
                tracing::warn!(task_id = %child.id(), error = %err, "orphaned subtask not removed");
            }
        }
    }

    async fn query(&self, query: TaskQuery) -> TaskStoreResult<Vec<Task>> {
        self.backend
            .query(query)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    async fn transition(&self, statement: TaskStatement) -> TaskStoreResult<()> {
        let expected = statement.expected_state();
        let name = statement.name();
        let Some(id) = statement.task_id() else {
            self.backend.exec(statement).await?;
            return Ok(());
        };
        let affected = self.backend.exec(statement).await?;
        if affected == 0 {
            tracing::debug!(task_id = %id, statement = name, "conditional task update lost");
            return Err(TaskStoreError::Conflict { id, expected });
        }
        tracing::debug!(task_id = %id, statement = name, "task updated");
        Ok(())
    }
}

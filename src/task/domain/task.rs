//! Task entity and its lifecycle transitions.

use super::{Criticality, TaskDomainError, TaskId, TaskPriority, TaskStatus, TaskType, WorkerId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::time::Duration;

/// Opaque key-value payload carried by tasks.
///
/// Used for task input, output, and metadata. The only keys the crate
/// itself writes are the ones in [`metadata_keys`].
pub type TaskPayload = Map<String, Value>;

/// Metadata keys recorded by lifecycle transitions.
pub mod metadata_keys {
    /// Reason passed to [`super::Task::fail`].
    pub const FAILURE_REASON: &str = "failure_reason";
    /// RFC 3339 timestamp of the failure.
    pub const FAILED_AT: &str = "failed_at";
    /// Reason passed to [`super::Task::block`].
    pub const BLOCK_REASON: &str = "block_reason";
    /// RFC 3339 timestamp of the block.
    pub const BLOCKED_AT: &str = "blocked_at";
    /// Reason passed to [`super::Task::cancel`].
    pub const CANCELLATION_REASON: &str = "cancellation_reason";
    /// RFC 3339 timestamp of the cancellation.
    pub const CANCELLED_AT: &str = "cancelled_at";
    /// IDs of the subtasks a task was split into.
    pub const SUBTASKS: &str = "subtasks";
}

/// Default retry ceiling for new tasks.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Progress reported for running tasks without an estimate.
const UNKNOWN_PROGRESS: u8 = 50;
/// Running tasks never report more than this until they complete.
const RUNNING_PROGRESS_CAP: u8 = 95;

/// Builder for new tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    task_type: TaskType,
    title: String,
    description: String,
    priority: TaskPriority,
    criticality: Criticality,
    depends_on: Vec<TaskId>,
    input: TaskPayload,
    max_retries: u32,
    estimated_duration: Option<Duration>,
    tags: Vec<String>,
}

impl TaskDraft {
    /// Creates a draft with required fields and defaults elsewhere.
    #[must_use]
    pub fn new(task_type: TaskType, title: impl Into<String>) -> Self {
        Self {
            task_type,
            title: title.into(),
            description: String::new(),
            priority: TaskPriority::default(),
            criticality: Criticality::default(),
            depends_on: Vec::new(),
            input: TaskPayload::new(),
            max_retries: DEFAULT_MAX_RETRIES,
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

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the criticality.
    #[must_use]
    pub const fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    /// Sets prerequisite task identifiers.
    #[must_use]
    pub fn with_dependencies(mut self, depends_on: impl IntoIterator<Item = TaskId>) -> Self {
        self.depends_on = depends_on.into_iter().collect();
        self
    }

    /// Sets the input payload.
    #[must_use]
    pub fn with_input(mut self, input: TaskPayload) -> Self {
        self.input = input;
        self
    }

    /// Overrides the retry ceiling.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the expected run time used for progress estimates.
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

/// Schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    task_type: TaskType,
    title: String,
    description: String,
    status: TaskStatus,
    priority: TaskPriority,
    criticality: Criticality,
    depends_on: Vec<TaskId>,
    blocked_by: Vec<TaskId>,
    input: TaskPayload,
    output: TaskPayload,
    assigned_to: Option<WorkerId>,
    original_worker: Option<WorkerId>,
    retry_count: u32,
    max_retries: u32,
    error_message: Option<String>,
    checkpoint: Option<Value>,
    estimated_duration: Option<Duration>,
    duration: Option<Duration>,
    metadata: TaskPayload,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// Parameter object for reconstructing a persisted task.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted task type.
    pub task_type: TaskType,
    /// Persisted title.
    pub title: String,
    /// Persisted description.
    pub description: String,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
    /// Persisted priority.
    pub priority: TaskPriority,
    /// Persisted criticality.
    pub criticality: Criticality,
    /// Persisted prerequisite identifiers.
    pub depends_on: Vec<TaskId>,
    /// Persisted runtime blockers.
    pub blocked_by: Vec<TaskId>,
    /// Persisted input payload.
    pub input: TaskPayload,
    /// Persisted output payload.
    pub output: TaskPayload,
    /// Worker currently holding the task.
    pub assigned_to: Option<WorkerId>,
    /// First worker that claimed the task.
    pub original_worker: Option<WorkerId>,
    /// Retries consumed so far.
    pub retry_count: u32,
    /// Retry ceiling.
    pub max_retries: u32,
    /// Last recorded error.
    pub error_message: Option<String>,
    /// Last checkpoint saved by the worker.
    pub checkpoint: Option<Value>,
    /// Expected run time.
    pub estimated_duration: Option<Duration>,
    /// Free-form metadata.
    pub metadata: TaskPayload,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest change timestamp.
    pub updated_at: DateTime<Utc>,
    /// Start timestamp, if claimed.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp, if finished.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a pending task from a draft.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] when the title is blank.
    pub fn new(draft: TaskDraft, clock: &impl Clock) -> Result<Self, TaskDomainError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(TaskDomainError::EmptyTitle);
        }
        let timestamp = clock.utc();
        Ok(Self {
            id: TaskId::new(),
            task_type: draft.task_type,
            title: title.to_owned(),
            description: draft.description,
            status: TaskStatus::Pending,
            priority: draft.priority,
            criticality: draft.criticality,
            depends_on: draft.depends_on,
            blocked_by: Vec::new(),
            input: draft.input,
            output: TaskPayload::new(),
            assigned_to: None,
            original_worker: None,
            retry_count: 0,
            max_retries: draft.max_retries,
            error_message: None,
            checkpoint: None,
            estimated_duration: draft.estimated_duration,
            duration: None,
            metadata: TaskPayload::new(),
            tags: draft.tags,
            created_at: timestamp,
            updated_at: timestamp,
            started_at: None,
            completed_at: None,
        })
    }

    /// Reconstructs a task from persisted storage.
    ///
    /// The run duration is derived from the start and completion timestamps.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        let duration = data
            .started_at
            .zip(data.completed_at)
            .map(|(started, completed)| elapsed_between(started, completed));
        Self {
            id: data.id,
            task_type: data.task_type,
            title: data.title,
            description: data.description,
            status: data.status,
            priority: data.priority,
            criticality: data.criticality,
            depends_on: data.depends_on,
            blocked_by: data.blocked_by,
            input: data.input,
            output: data.output,
            assigned_to: data.assigned_to,
            original_worker: data.original_worker,
            retry_count: data.retry_count,
            max_retries: data.max_retries,
            error_message: data.error_message,
            checkpoint: data.checkpoint,
            estimated_duration: data.estimated_duration,
            duration,
            metadata: data.metadata,
            tags: data.tags,
            created_at: data.created_at,
            updated_at: data.updated_at,
            started_at: data.started_at,
            completed_at: data.completed_at,
        }
    }

    /// Decomposes the task into its persisted representation.
    #[must_use]
    pub fn into_persisted(self) -> PersistedTaskData {
        PersistedTaskData {
            id: self.id,
            task_type: self.task_type,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            criticality: self.criticality,
            depends_on: self.depends_on,
            blocked_by: self.blocked_by,
            input: self.input,
            output: self.output,
            assigned_to: self.assigned_to,
            original_worker: self.original_worker,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            error_message: self.error_message,
            checkpoint: self.checkpoint,
            estimated_duration: self.estimated_duration,
            metadata: self.metadata,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task type.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the priority.
    #[must_use]
    pub const fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Returns the criticality.
    #[must_use]
    pub const fn criticality(&self) -> Criticality {
        self.criticality
    }

    /// Returns the static prerequisites.
    #[must_use]
    pub fn depends_on(&self) -> &[TaskId] {
        &self.depends_on
    }

    /// Returns the runtime blockers.
    #[must_use]
    pub fn blocked_by(&self) -> &[TaskId] {
        &self.blocked_by
    }

    /// Returns the input payload.
    #[must_use]
    pub const fn input(&self) -> &TaskPayload {
        &self.input
    }

    /// Returns the output payload.
    #[must_use]
    pub const fn output(&self) -> &TaskPayload {
        &self.output
    }

    /// Returns the worker holding the task.
    #[must_use]
    pub const fn assigned_to(&self) -> Option<WorkerId> {
        self.assigned_to
    }

    /// Returns the first worker that claimed the task.
    #[must_use]
    pub const fn original_worker(&self) -> Option<WorkerId> {
        self.original_worker
    }

    /// Returns the retries consumed so far.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the retry ceiling.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the last recorded error.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the last checkpoint.
    #[must_use]
    pub const fn checkpoint(&self) -> Option<&Value> {
        self.checkpoint.as_ref()
    }

    /// Returns the expected run time.
    #[must_use]
    pub const fn estimated_duration(&self) -> Option<Duration> {
        self.estimated_duration
    }

    /// Returns the measured run time of a completed task.
    #[must_use]
    pub const fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Returns the metadata map.
    #[must_use]
    pub const fn metadata(&self) -> &TaskPayload {
        &self.metadata
    }

    /// Returns the tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest change timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns the completion timestamp.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Reports whether the task may run given the set of completed tasks.
    ///
    /// A task is ready when it is neither completed nor running, has no
    /// runtime blockers, and every prerequisite is in `completed`.
    #[must_use]
    pub fn is_ready(&self, completed: &BTreeSet<TaskId>) -> bool {
        !matches!(self.status, TaskStatus::Completed | TaskStatus::InProgress)
            && self.blocked_by.is_empty()
            && self.depends_on.iter().all(|id| completed.contains(id))
    }

    /// Reports whether [`Task::start`] would accept the current status.
    #[must_use]
    pub const fn can_start(&self) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::Ready)
    }

    /// Promotes a pending task to ready once its prerequisites completed.
    ///
    /// Returns `true` when the status changed.
    pub fn mark_ready(&mut self, completed: &BTreeSet<TaskId>, clock: &impl Clock) -> bool {
        if self.status != TaskStatus::Pending || !self.is_ready(completed) {
            return false;
        }
        self.status = TaskStatus::Ready;
        self.touch(clock);
        true
    }

    /// Reserves the task for a worker without starting it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is
    /// pending or ready.
    pub fn assign(&mut self, worker: WorkerId, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if !self.can_start() {
            return Err(self.invalid("assign"));
        }
        self.status = TaskStatus::Assigned;
        self.assigned_to = Some(worker);
        self.touch(clock);
        Ok(())
    }

    /// Starts execution on behalf of `worker`.
    ///
    /// A task assigned to the same worker may also start.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] from any other status.
    pub fn start(&mut self, worker: WorkerId, clock: &impl Clock) -> Result<(), TaskDomainError> {
        let reserved_for_worker =
            self.status == TaskStatus::Assigned && self.assigned_to == Some(worker);
        if !self.can_start() && !reserved_for_worker {
            return Err(self.invalid("start"));
        }
        let now = clock.utc();
        self.status = TaskStatus::InProgress;
        self.assigned_to = Some(worker);
        self.original_worker.get_or_insert(worker);
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Marks the task completed with its output.
    ///
    /// The recorded duration is the time since [`Task::start`], or zero when
    /// the task never started.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] from a terminal status.
    pub fn complete(&mut self, output: TaskPayload, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.ensure_active("complete")?;
        let now = clock.utc();
        self.duration = Some(
            self.started_at
                .map_or(Duration::ZERO, |started| elapsed_between(started, now)),
        );
        self.status = TaskStatus::Completed;
        self.output = output;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Marks the task failed and records the reason in metadata.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] from a terminal status.
    pub fn fail(&mut self, reason: &str, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.ensure_active("fail")?;
        let now = clock.utc();
        self.status = TaskStatus::Failed;
        self.error_message = Some(reason.to_owned());
        self.record_reason(metadata_keys::FAILURE_REASON, metadata_keys::FAILED_AT, reason, now);
        self.updated_at = now;
        Ok(())
    }

    /// Returns a running task to the queue if it has retries left.
    ///
    /// Returns the attempt number just consumed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is in
    /// progress, or [`TaskDomainError::RetriesExhausted`] when no retries
    /// remain.
    pub fn requeue(&mut self, reason: &str, clock: &impl Clock) -> Result<u32, TaskDomainError> {
        if self.status != TaskStatus::InProgress {
            return Err(self.invalid("requeue"));
        }
        if self.retry_count >= self.max_retries {
            return Err(TaskDomainError::RetriesExhausted {
                task_id: self.id,
                max_retries: self.max_retries,
            });
        }
        self.retry_count = self.retry_count.saturating_add(1);
        self.status = TaskStatus::Pending;
        self.assigned_to = None;
        self.error_message = Some(reason.to_owned());
        self.touch(clock);
        Ok(self.retry_count)
    }

    /// Blocks the task on other tasks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] from a terminal status.
    pub fn block(
        &mut self,
        reason: &str,
        blocked_by: Vec<TaskId>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.ensure_active("block")?;
        let now = clock.utc();
        self.status = TaskStatus::Blocked;
        self.blocked_by = blocked_by;
        self.record_reason(metadata_keys::BLOCK_REASON, metadata_keys::BLOCKED_AT, reason, now);
        self.updated_at = now;
        Ok(())
    }

    /// Releases a blocked task back to ready.
    ///
    /// Returns `false` and leaves the task untouched unless it was blocked.
    pub fn unblock(&mut self, clock: &impl Clock) -> bool {
        if self.status != TaskStatus::Blocked {
            return false;
        }
        self.status = TaskStatus::Ready;
        self.blocked_by.clear();
        self.touch(clock);
        true
    }

    /// Cancels the task and records the reason in metadata.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] from a terminal status.
    pub fn cancel(&mut self, reason: &str, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.ensure_active("cancel")?;
        let now = clock.utc();
        self.status = TaskStatus::Cancelled;
        self.record_reason(
            metadata_keys::CANCELLATION_REASON,
            metadata_keys::CANCELLED_AT,
            reason,
            now,
        );
        self.updated_at = now;
        Ok(())
    }

    /// Stores a worker checkpoint on a running task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless in progress.
    pub fn record_checkpoint(
        &mut self,
        checkpoint: Value,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if self.status != TaskStatus::InProgress {
            return Err(self.invalid("checkpoint"));
        }
        self.checkpoint = Some(checkpoint);
        self.touch(clock);
        Ok(())
    }

    /// Estimates completion as a percentage in `0..=100`.
    #[must_use]
    pub fn progress(&self, clock: &impl Clock) -> u8 {
        match self.status {
            TaskStatus::Completed => 100,
            TaskStatus::InProgress => self.running_progress(clock.utc()),
            _ => 0,
        }
    }

    fn running_progress(&self, now: DateTime<Utc>) -> u8 {
        let (Some(started), Some(estimate)) = (self.started_at, self.estimated_duration) else {
            return UNKNOWN_PROGRESS;
        };
        let estimate_ms = estimate.as_millis();
        if estimate_ms == 0 {
            return UNKNOWN_PROGRESS;
        }
        let elapsed_ms = elapsed_between(started, now).as_millis();
        let percent = elapsed_ms
            .saturating_mul(100)
            .checked_div(estimate_ms)
            .unwrap_or_default();
        u8::try_from(percent)
            .unwrap_or(RUNNING_PROGRESS_CAP)
            .min(RUNNING_PROGRESS_CAP)
    }

    fn ensure_active(&self, action: &'static str) -> Result<(), TaskDomainError> {
        if self.status.is_terminal() {
            return Err(self.invalid(action));
        }
        Ok(())
    }

    const fn invalid(&self, action: &'static str) -> TaskDomainError {
        TaskDomainError::InvalidTransition {
            task_id: self.id,
            status: self.status,
            action,
        }
    }

    fn record_reason(
        &mut self,
        reason_key: &str,
        at_key: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) {
        self.metadata
            .insert(reason_key.to_owned(), Value::String(reason.to_owned()));
        self.metadata
            .insert(at_key.to_owned(), Value::String(at.to_rfc3339()));
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}

/// Non-negative wall time between two instants.
fn elapsed_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or_default()
}

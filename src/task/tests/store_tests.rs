//! Service tests for the conditional-update task store.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::ManualClock;
use crate::task::{
    adapters::memory::InMemoryTaskBackend,
    domain::{Task, TaskId, TaskPayload, TaskPriority, TaskStatus, WorkerId, metadata_keys},
    ports::TaskBackendError,
    services::{CreateTaskRequest, RetryDecision, SubtaskRequest, TaskStore, TaskStoreError},
};
use chrono::{DateTime, FixedOffset, TimeDelta};
use eyre::ensure;
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use serde_json::json;

type TestStore = TaskStore<InMemoryTaskBackend, DefaultClock>;

#[fixture]
fn store() -> TestStore {
    TaskStore::new(Arc::new(InMemoryTaskBackend::new()), Arc::new(DefaultClock))
}

fn planning(title: &str) -> CreateTaskRequest {
    CreateTaskRequest::new(title, "planning", "normal")
}

fn recorded_at(task: &Task, key: &str) -> Option<DateTime<FixedOffset>> {
    task.metadata()
        .get(key)
        .and_then(serde_json::Value::as_str)
        .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn created_task_reads_back_with_priority_and_pending_status(
    store: TestStore,
) -> eyre::Result<()> {
    let created = store
        .create_task(CreateTaskRequest::new("T", "planning", "critical").with_description("d"))
        .await?;
    let fetched = store.get_task(created.id()).await?;

    ensure!(fetched.priority() == TaskPriority::Critical, "priority lost");
    ensure!(fetched.status() == TaskStatus::Pending, "new task should be pending");
    ensure!(fetched.description() == "d", "description lost");
    ensure!(fetched == created, "created and fetched tasks differ");
    Ok(())
}

#[rstest]
#[case(CreateTaskRequest::new("T", "deployment", "normal"))]
#[case(CreateTaskRequest::new("T", "planning", "urgent"))]
#[case(CreateTaskRequest::new("T", "planning", "low").with_criticality("extreme"))]
#[case(CreateTaskRequest::new("  ", "planning", "low"))]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_requests_are_validation_errors(
    store: TestStore,
    #[case] request: CreateTaskRequest,
) {
    let err = store
        .create_task(request)
        .await
        .expect_err("invalid request should fail");
    assert!(err.is_validation(), "unexpected error class: {err}");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_task_is_not_found(store: TestStore) {
    let id = TaskId::new();
    let result = store.get_task(id).await;
    assert!(matches!(result, Err(TaskStoreError::NotFound(missing)) if missing == id));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_start_is_a_conflict(store: TestStore) -> eyre::Result<()> {
    let task = store.create_task(planning("claim me")).await?;
    store.start_task(task.id()).await?;

    let err = store
        .start_task(task.id())
        .await
        .expect_err("second start should lose");
    ensure!(err.is_conflict(), "expected conflict, got {err}");
    ensure!(
        err.to_string().contains("not in pending state"),
        "unexpected message: {err}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn complete_requires_running_task(store: TestStore) -> eyre::Result<()> {
    let task = store.create_task(planning("finish me")).await?;

    let early = store.complete_task(task.id(), TaskPayload::new()).await;
    ensure!(
        matches!(early, Err(TaskStoreError::Conflict { expected: "in_progress", .. })),
        "pending task completed: {early:?}"
    );

    let worker = WorkerId::new();
    store.claim_task(task.id(), worker).await?;
    let mut result = TaskPayload::new();
    result.insert("summary".to_owned(), json!("done"));
    store.complete_task(task.id(), result).await?;

    let stored = store.get_task(task.id()).await?;
    ensure!(stored.status() == TaskStatus::Completed, "task not completed");
    ensure!(stored.assigned_to() == Some(worker), "worker lost");
    ensure!(stored.output().get("summary") == Some(&json!("done")), "result lost");
    ensure!(stored.completed_at().is_some(), "completion time missing");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fail_or_retry_requeues_until_retries_run_out(store: TestStore) -> eyre::Result<()> {
    let task = store
        .create_task(planning("flaky").with_max_retries(1))
        .await?;
    let worker = WorkerId::new();

    store.claim_task(task.id(), worker).await?;
    let first = store.fail_or_retry(task.id(), "timeout").await?;
    ensure!(first == RetryDecision::Requeued, "first failure should requeue");

    let requeued = store.get_task(task.id()).await?;
    ensure!(requeued.status() == TaskStatus::Pending, "requeued task not pending");
    ensure!(requeued.retry_count() == 1, "retry count not incremented");
    ensure!(requeued.assigned_to().is_none(), "worker not released");
    ensure!(requeued.original_worker() == Some(worker), "original worker lost");

    store.claim_task(task.id(), worker).await?;
    let second = store.fail_or_retry(task.id(), "timeout again").await?;
    ensure!(second == RetryDecision::Failed, "exhausted task should fail");

    let failed = store.get_task(task.id()).await?;
    ensure!(failed.status() == TaskStatus::Failed, "task not failed");
    ensure!(failed.error_message() == Some("timeout again"), "error lost");
    ensure!(
        failed.metadata().get(metadata_keys::FAILURE_REASON) == Some(&json!("timeout again")),
        "failure reason not recorded"
    );
    ensure!(
        recorded_at(&failed, metadata_keys::FAILED_AT).is_some(),
        "failure time not recorded: {:?}",
        failed.metadata()
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fail_on_terminal_task_is_a_conflict(store: TestStore) -> eyre::Result<()> {
    let task = store.create_task(planning("doomed")).await?;
    store.fail_task(task.id(), "bad input").await?;

    let again = store.fail_task(task.id(), "still bad").await;
    ensure!(
        matches!(again, Err(TaskStoreError::Conflict { expected: "active", .. })),
        "terminal task failed twice: {again:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_records_reason(store: TestStore) -> eyre::Result<()> {
    let task = store.create_task(planning("obsolete")).await?;
    store.cancel_task(task.id(), "superseded").await?;

    let cancelled = store.get_task(task.id()).await?;
    ensure!(cancelled.status() == TaskStatus::Cancelled, "task not cancelled");
    ensure!(
        cancelled.metadata().get(metadata_keys::CANCELLATION_REASON) == Some(&json!("superseded")),
        "reason not recorded"
    );
    ensure!(
        recorded_at(&cancelled, metadata_keys::CANCELLED_AT).is_some(),
        "cancellation time not recorded: {:?}",
        cancelled.metadata()
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn checkpoint_is_stored_on_running_task(store: TestStore) -> eyre::Result<()> {
    let task = store.create_task(planning("long job")).await?;
    ensure!(
        store
            .checkpoint_task(task.id(), json!({"offset": 1}))
            .await
            .is_err(),
        "pending task accepted checkpoint"
    );

    store.start_task(task.id()).await?;
    store.checkpoint_task(task.id(), json!({"offset": 7})).await?;

    let running = store.get_task(task.id()).await?;
    ensure!(running.checkpoint() == Some(&json!({"offset": 7})), "checkpoint lost");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn release_worker_returns_held_tasks_to_pending(store: TestStore) -> eyre::Result<()> {
    let lost = WorkerId::new();
    let healthy = WorkerId::new();
    let first = store.create_task(planning("one")).await?;
    let second = store.create_task(planning("two")).await?;
    let third = store.create_task(planning("three")).await?;
    store.claim_task(first.id(), lost).await?;
    store.claim_task(second.id(), lost).await?;
    store.claim_task(third.id(), healthy).await?;

    let released = store.release_worker(lost).await?;
    ensure!(released == 2, "expected two released tasks, got {released}");

    for id in [first.id(), second.id()] {
        let task = store.get_task(id).await?;
        ensure!(task.status() == TaskStatus::Pending, "task {id} not released");
        ensure!(task.assigned_to().is_none(), "task {id} still assigned");
    }
    let untouched = store.get_task(third.id()).await?;
    ensure!(untouched.status() == TaskStatus::InProgress, "healthy worker lost its task");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn running_tasks_cannot_be_deleted(store: TestStore) -> eyre::Result<()> {
    let task = store.create_task(planning("busy")).await?;
    store.start_task(task.id()).await?;
    ensure!(
        store.delete_task(task.id()).await.is_err(),
        "running task was deleted"
    );

    let idle = store.create_task(planning("idle")).await?;
    store.delete_task(idle.id()).await?;
    ensure!(
        matches!(store.get_task(idle.id()).await, Err(TaskStoreError::NotFound(_))),
        "deleted task still readable"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn list_returns_newest_first_and_filters_by_status() -> eyre::Result<()> {
    let clock = Arc::new(ManualClock::new());
    let store = TaskStore::new(
        Arc::new(InMemoryTaskBackend::with_clock(Arc::clone(&clock))),
        Arc::new(DefaultClock),
    );
    let older = store.create_task(planning("older")).await?;
    clock.advance(TimeDelta::seconds(1));
    let newer = store.create_task(planning("newer")).await?;
    store.start_task(newer.id()).await?;

    let all = store.list_tasks().await?;
    let ids: Vec<_> = all.iter().map(crate::task::domain::Task::id).collect();
    ensure!(ids == vec![newer.id(), older.id()], "unexpected order {ids:?}");

    let pending = store.list_tasks_by_status(TaskStatus::Pending).await?;
    ensure!(
        pending.len() == 1 && pending.iter().all(|task| task.id() == older.id()),
        "status filter returned {pending:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn export_and_import_preserve_everything_but_timestamps(
    store: TestStore,
) -> eyre::Result<()> {
    let mut input = TaskPayload::new();
    input.insert("path".to_owned(), json!("src/lib.rs"));
    let dependency = store.create_task(planning("dependency")).await?;
    let original = store
        .create_task(
            CreateTaskRequest::new("Refactor parser", "refactoring", "high")
                .with_description("split into modules")
                .with_criticality("critical")
                .with_input(input)
                .with_dependencies([dependency.id()])
                .with_tags(["parser".to_owned()])
                .with_estimated_duration(std::time::Duration::from_secs(600)),
        )
        .await?;
    store.claim_task(original.id(), WorkerId::new()).await?;
    store
        .checkpoint_task(original.id(), json!({"files_done": 3}))
        .await?;
    let exported = store.get_task(original.id()).await?;

    let target = TaskStore::new(Arc::new(InMemoryTaskBackend::new()), Arc::new(DefaultClock));
    let imported = target.import_task(exported.clone()).await?;

    let mut expected = exported.into_persisted();
    let actual = imported.into_persisted();
    expected.created_at = actual.created_at;
    expected.updated_at = actual.updated_at;
    ensure!(actual == expected, "import changed fields:\n{actual:?}\n{expected:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn split_children_inherit_the_parent_and_hold_it_back(
    store: TestStore,
) -> eyre::Result<()> {
    let schema = store.create_task(planning("schema")).await?;
    let fixtures = store.create_task(planning("fixtures")).await?;
    let parent = store
        .create_task(
            CreateTaskRequest::new("migrate", "refactoring", "high")
                .with_dependencies([schema.id()])
                .with_max_retries(5),
        )
        .await?;
    let dependent = store
        .create_task(planning("announce").with_dependencies([parent.id()]))
        .await?;

    let children = store
        .split_task(
            parent.id(),
            vec![
                SubtaskRequest::new("users table").with_description("move users"),
                SubtaskRequest::new("orders table").with_dependencies([fixtures.id()]),
            ],
        )
        .await?;
    let [users, orders] = children.as_slice() else {
        eyre::bail!("expected two subtasks, got {}", children.len());
    };

    for child in [users, orders] {
        ensure!(child.task_type() == parent.task_type(), "type not inherited");
        ensure!(child.priority() == parent.priority(), "priority not inherited");
        ensure!(child.max_retries() == 5, "retries not inherited");
        ensure!(child.status() == TaskStatus::Pending, "subtask not pending");
    }
    ensure!(users.depends_on() == [schema.id()], "prerequisites not inherited");
    ensure!(
        orders.depends_on() == [schema.id(), fixtures.id()],
        "own prerequisites lost: {:?}",
        orders.depends_on()
    );

    let split = store.get_task(parent.id()).await?;
    ensure!(
        split.depends_on() == [schema.id(), users.id(), orders.id()],
        "parent not waiting on its subtasks: {:?}",
        split.depends_on()
    );
    ensure!(
        split.metadata().get(metadata_keys::SUBTASKS)
            == Some(&json!([users.id().to_string(), orders.id().to_string()])),
        "subtasks not recorded: {:?}",
        split.metadata()
    );

    let mut completed = BTreeSet::from([schema.id(), fixtures.id()]);
    ensure!(users.is_ready(&completed) && orders.is_ready(&completed), "subtasks not ready");
    ensure!(!split.is_ready(&completed), "parent ready before its subtasks");
    completed.extend([users.id(), orders.id()]);
    ensure!(split.is_ready(&completed), "parent not ready after its subtasks");
    ensure!(!dependent.is_ready(&completed), "dependent skipped the parent");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_splits_leave_no_subtasks_behind(store: TestStore) -> eyre::Result<()> {
    let parent = store.create_task(planning("parent")).await?;

    let empty = store.split_task(parent.id(), Vec::new()).await;
    ensure!(
        empty.as_ref().is_err_and(TaskStoreError::is_validation),
        "empty split accepted: {empty:?}"
    );
    let cyclic = store
        .split_task(
            parent.id(),
            vec![SubtaskRequest::new("loop").with_dependencies([parent.id()])],
        )
        .await;
    ensure!(
        matches!(cyclic, Err(TaskStoreError::InvalidSplit { .. })),
        "subtask depending on its parent accepted: {cyclic:?}"
    );

    store.start_task(parent.id()).await?;
    let running = store
        .split_task(parent.id(), vec![SubtaskRequest::new("late")])
        .await;
    ensure!(
        running.as_ref().is_err_and(TaskStoreError::is_conflict),
        "running task split: {running:?}"
    );

    let missing = store
        .split_task(TaskId::new(), vec![SubtaskRequest::new("x")])
        .await;
    ensure!(
        matches!(missing, Err(TaskStoreError::NotFound(_))),
        "unknown parent split: {missing:?}"
    );
    ensure!(store.list_tasks().await?.len() == 1, "subtasks left behind");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn closed_backend_rejects_calls(store: TestStore) {
    store.ping().await.expect("open backend answers ping");
    store.close();

    let result = store.ping().await;
    assert!(matches!(
        result,
        Err(TaskStoreError::Backend(TaskBackendError::Closed))
    ));
}

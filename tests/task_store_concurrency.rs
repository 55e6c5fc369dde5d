//! Concurrent claims against the task store.
//!
//! Every transition is a single conditional statement, so racing workers
//! must observe exactly one winner per task.

use eyre::ensure;
use helix_orchestrator::graph::ReadinessScheduler;
use helix_orchestrator::task::{
    adapters::memory::InMemoryTaskBackend,
    domain::{TaskPayload, TaskPriority, TaskStatus, WorkerId},
    services::{CreateTaskRequest, TaskStore, TaskStoreError},
};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::collections::BTreeSet;
use std::sync::Arc;

type Store = TaskStore<InMemoryTaskBackend, DefaultClock>;

#[fixture]
fn store() -> Arc<Store> {
    Arc::new(TaskStore::new(
        Arc::new(InMemoryTaskBackend::new()),
        Arc::new(DefaultClock),
    ))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn critical_task_reads_back_pending(store: Arc<Store>) -> eyre::Result<()> {
    let created = store
        .create_task(CreateTaskRequest::new("T", "planning", "critical").with_description("d"))
        .await?;

    let fetched = store.get_task(created.id()).await?;
    ensure!(fetched.priority() == TaskPriority::Critical, "priority lost");
    ensure!(fetched.status() == TaskStatus::Pending, "task not pending");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn two_concurrent_starts_have_one_winner(store: Arc<Store>) -> eyre::Result<()> {
    let task = store
        .create_task(CreateTaskRequest::new("race", "testing", "normal"))
        .await?;

    let (first, second) = tokio::join!(store.start_task(task.id()), store.start_task(task.id()));
    let outcomes = [first, second];
    let wins = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    ensure!(wins == 1, "expected one winner, got {wins}");
    let loser = outcomes.iter().find_map(|outcome| outcome.as_ref().err());
    ensure!(
        loser.is_some_and(|err| err.to_string().contains("not in pending state")),
        "unexpected loser {loser:?}"
    );
    Ok(())
}

#[rstest]
#[case(2)]
#[case(16)]
#[case(64)]
#[tokio::test(flavor = "multi_thread")]
async fn many_workers_claiming_one_task_yield_one_success(
    store: Arc<Store>,
    #[case] workers: usize,
) -> eyre::Result<()> {
    let id = store
        .create_task(CreateTaskRequest::new("contended", "code_generation", "high"))
        .await?
        .id();

    let mut claims = tokio::task::JoinSet::new();
    for _ in 0..workers {
        let racer = Arc::clone(&store);
        let worker = WorkerId::new();
        claims.spawn(async move { (worker, racer.claim_task(id, worker).await) });
    }

    let mut winners = Vec::new();
    let mut conflicts = 0_usize;
    while let Some(joined) = claims.join_next().await {
        let (worker, outcome) = joined?;
        match outcome {
            Ok(()) => winners.push(worker),
            Err(err) if err.is_conflict() => conflicts += 1,
            Err(err) => return Err(err.into()),
        }
    }

    ensure!(winners.len() == 1, "expected one winner, got {}", winners.len());
    ensure!(conflicts == workers - 1, "expected {} conflicts, got {conflicts}", workers - 1);
    let claimed = store.get_task(id).await?;
    ensure!(claimed.status() == TaskStatus::InProgress, "task not running");
    ensure!(claimed.assigned_to() == winners.first().copied(), "winner not recorded");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_workers_drain_a_queue_without_double_claims(
    store: Arc<Store>,
) -> eyre::Result<()> {
    let mut ids = Vec::new();
    for index in 0..20 {
        let created = store
            .create_task(CreateTaskRequest::new(format!("job {index}"), "testing", "normal"))
            .await?;
        ids.push(created.id());
    }

    let mut workers = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let queue = Arc::clone(&store);
        let candidates = ids.clone();
        workers.spawn(async move {
            let worker = WorkerId::new();
            let mut won = Vec::new();
            for id in candidates {
                match queue.claim_task(id, worker).await {
                    Ok(()) => won.push(id),
                    Err(err) if err.is_conflict() => {}
                    Err(err) => return Err(err),
                }
            }
            Ok::<_, TaskStoreError>(won)
        });
    }

    let mut claimed = BTreeSet::new();
    while let Some(joined) = workers.join_next().await {
        for id in joined?? {
            ensure!(claimed.insert(id), "task {id} claimed twice");
        }
    }
    ensure!(claimed.len() == ids.len(), "only {} of {} claimed", claimed.len(), ids.len());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn scheduler_orders_stored_tasks_once_dependencies_finish(
    store: Arc<Store>,
) -> eyre::Result<()> {
    let setup = store
        .create_task(CreateTaskRequest::new("setup", "planning", "low"))
        .await?;
    let urgent = store
        .create_task(
            CreateTaskRequest::new("urgent fix", "debugging", "critical")
                .with_dependencies([setup.id()]),
        )
        .await?;
    let routine = store
        .create_task(CreateTaskRequest::new("routine", "documentation", "normal"))
        .await?;

    store.start_task(setup.id()).await?;
    store
        .complete_task(setup.id(), TaskPayload::new())
        .await?;

    let mut tasks = store.list_tasks().await?;
    let ready = ReadinessScheduler::new(Arc::new(DefaultClock))
        .schedule(&mut tasks, &BTreeSet::new())?;
    ensure!(
        ready == vec![urgent.id(), routine.id()],
        "unexpected ready queue {ready:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dead_worker_tasks_return_to_pending(store: Arc<Store>) -> eyre::Result<()> {
    let worker = WorkerId::new();
    let task = store
        .create_task(CreateTaskRequest::new("orphan", "analysis", "normal"))
        .await?;
    store.claim_task(task.id(), worker).await?;

    ensure!(store.release_worker(worker).await? == 1, "task not released");
    let released = store.get_task(task.id()).await?;
    ensure!(released.status() == TaskStatus::Pending, "released task not pending");

    let rival = WorkerId::new();
    store.claim_task(task.id(), rival).await?;
    let reclaimed = store.get_task(task.id()).await?;
    ensure!(reclaimed.assigned_to() == Some(rival), "released task not reclaimable");
    Ok(())
}

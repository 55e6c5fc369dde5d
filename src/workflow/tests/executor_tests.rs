//! Unit tests for the linear workflow executor.

use super::{ScriptedHandler, project_at};
use crate::test_support::ManualClock;
use crate::workflow::{
    adapters::TracingNotifier,
    domain::{
        Project, Step, StepAction, StepId, StepStatus, StepType, Workflow, WorkflowDraft,
        WorkflowMode, WorkflowStatus,
    },
    ports::{MockNotifier, Notifier, StepContext, WorkflowEvent},
    services::{ExecutorError, HandlerRegistry, WorkflowExecutor},
};
use camino::Utf8Path;
use eyre::ensure;
use rstest::{fixture, rstest};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

#[fixture]
fn project() -> Project {
    project_at(Utf8Path::new("/tmp"))
}

fn command(id: &str) -> Step {
    Step::new(id, id, StepType::Execution, StepAction::ExecuteCommand)
}

fn workflow(project: &Project, steps: Vec<Step>) -> Workflow {
    Workflow::new(
        WorkflowDraft::new("pipeline", WorkflowMode::Custom, project.id()).with_steps(steps),
        &ManualClock::new(),
    )
    .expect("well-formed workflow")
}

fn executor_with<N: Notifier>(
    handler: Arc<ScriptedHandler>,
    notifier: N,
) -> WorkflowExecutor<N, ManualClock> {
    let handlers = HandlerRegistry::new().with_handler(StepAction::ExecuteCommand, handler);
    WorkflowExecutor::new(
        Arc::new(handlers),
        Arc::new(notifier),
        Arc::new(ManualClock::new()),
    )
}

fn context_for(workflow: &Workflow, project: &Project) -> StepContext {
    StepContext::new(workflow.id(), project.clone(), CancellationToken::new())
}

fn status_of(workflow: &Workflow, id: &str) -> Option<StepStatus> {
    workflow.step(&StepId::from(id)).map(Step::status)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_step_halts_walk_and_leaves_dependents_pending(
    project: Project,
) -> eyre::Result<()> {
    let handler = Arc::new(ScriptedHandler::failing(&["a"]));
    let executor = executor_with(Arc::clone(&handler), TracingNotifier::new());
    let mut run = workflow(
        &project,
        vec![command("a"), command("b").with_dependencies(["a"])],
    );
    let context = context_for(&run, &project);

    let status = executor.execute(&mut run, &context).await?;

    ensure!(status == WorkflowStatus::Failed, "expected failure, got {status}");
    ensure!(run.status() == WorkflowStatus::Failed, "workflow not failed");
    ensure!(status_of(&run, "a") == Some(StepStatus::Failed), "a not failed");
    ensure!(status_of(&run, "b") == Some(StepStatus::Pending), "b should stay pending");
    ensure!(handler.ran() == vec![StepId::from("a")], "b must not run");
    let error = run
        .step(&StepId::from("a"))
        .and_then(Step::error)
        .unwrap_or_default();
    ensure!(
        error.starts_with("command execution failed") && error.contains("a broke"),
        "unexpected error {error}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn successful_walk_stores_outputs(project: Project) -> eyre::Result<()> {
    let handler = Arc::new(ScriptedHandler::default());
    let executor = executor_with(Arc::clone(&handler), TracingNotifier::new());
    let mut run = workflow(
        &project,
        vec![command("a"), command("b").with_dependencies(["a"])],
    );
    let context = context_for(&run, &project);

    let status = executor.execute(&mut run, &context).await?;

    ensure!(status == WorkflowStatus::Completed, "expected completion, got {status}");
    ensure!(
        run.step(&StepId::from("b")).and_then(Step::output) == Some("b ok"),
        "output not stored"
    );
    ensure!(run.started_at().is_some() && run.completed_at().is_some(), "timestamps missing");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn step_with_incomplete_prerequisite_is_skipped(project: Project) -> eyre::Result<()> {
    let handler = Arc::new(ScriptedHandler::default());
    let executor = executor_with(Arc::clone(&handler), TracingNotifier::new());
    let built = workflow(
        &project,
        vec![
            command("a"),
            command("b").with_dependencies(["a"]),
            command("c"),
        ],
    );
    let mut snapshot = serde_json::to_value(&built)?;
    if let Some(first) = snapshot.pointer_mut("/steps/0/status") {
        *first = json!("skipped");
    }
    let mut restored: Workflow = serde_json::from_value(snapshot)?;
    let context = context_for(&restored, &project);

    let status = executor.execute(&mut restored, &context).await?;

    ensure!(status == WorkflowStatus::Completed, "expected completion, got {status}");
    ensure!(status_of(&restored, "b") == Some(StepStatus::Skipped), "b should be skipped");
    ensure!(status_of(&restored, "c") == Some(StepStatus::Completed), "c should run");
    ensure!(handler.ran() == vec![StepId::from("c")], "only c should run");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unregistered_action_fails_the_step(project: Project) -> eyre::Result<()> {
    let executor = executor_with(Arc::new(ScriptedHandler::default()), TracingNotifier::new());
    let mut run = workflow(
        &project,
        vec![Step::new("lint", "Lint", StepType::Validation, StepAction::LintCode)],
    );
    let context = context_for(&run, &project);

    executor.execute(&mut run, &context).await?;

    ensure!(
        run.error() == Some("no handler registered for action lint_code"),
        "unexpected error {:?}",
        run.error()
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_context_fails_the_next_step(project: Project) -> eyre::Result<()> {
    let handler = Arc::new(ScriptedHandler::default());
    let executor = executor_with(Arc::clone(&handler), TracingNotifier::new());
    let mut run = workflow(&project, vec![command("a")]);
    let context = context_for(&run, &project);
    context.cancellation().cancel();

    let status = executor.execute(&mut run, &context).await?;

    ensure!(status == WorkflowStatus::Failed, "cancelled run should fail");
    ensure!(run.error() == Some("cancelled"), "unexpected error {:?}", run.error());
    ensure!(handler.ran().is_empty(), "handler ran after cancellation");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn context_for_another_project_is_rejected(project: Project) {
    let executor = executor_with(Arc::new(ScriptedHandler::default()), TracingNotifier::new());
    let mut run = workflow(&project, vec![command("a")]);
    let stranger = project_at(Utf8Path::new("/tmp"));
    let context = context_for(&run, &stranger);

    let result = executor.execute(&mut run, &context).await;

    assert!(matches!(result, Err(ExecutorError::ProjectMismatch { .. })));
    assert_eq!(run.status(), WorkflowStatus::Pending);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn events_follow_the_walk(project: Project) -> eyre::Result<()> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut notifier = MockNotifier::new();
    let sink = Arc::clone(&events);
    notifier
        .expect_notify()
        .times(6)
        .returning(move |event: WorkflowEvent| {
            if let Ok(mut recorded) = sink.lock() {
                recorded.push(event.name());
            }
        });
    let executor = executor_with(Arc::new(ScriptedHandler::failing(&["b"])), notifier);
    let mut run = workflow(
        &project,
        vec![command("a"), command("b").with_dependencies(["a"])],
    );
    let context = context_for(&run, &project);

    executor.execute(&mut run, &context).await?;

    let recorded = events.lock().map(|names| names.clone()).unwrap_or_default();
    ensure!(
        recorded
            == [
                "workflow_started",
                "step_started",
                "step_completed",
                "step_started",
                "step_failed",
                "workflow_failed",
            ],
        "unexpected events {recorded:?}"
    );
    Ok(())
}

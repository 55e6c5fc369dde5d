//! Supervised background execution of workflows.

use super::{HandlerRegistry, WorkflowExecutor, WorkflowRegistry};
use crate::workflow::{
    domain::{
        Project, ProjectId, Workflow, WorkflowDomainError, WorkflowId, WorkflowMode,
        WorkflowStatus, build_workflow,
    },
    ports::{Notifier, ProjectCatalog, ProjectCatalogError, StepContext, WorkflowEvent},
};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Completion signal per active run, cancelled once its supervisor exits.
type ActiveRuns = Arc<Mutex<HashMap<WorkflowId, CancellationToken>>>;

/// Failure message recorded when a handler panics.
pub const PANIC_FAILURE: &str = "handler panicked";

/// Failure message recorded when a run is aborted before finishing.
pub const ABORT_FAILURE: &str = "cancelled";

/// Errors returned by the workflow runner.
#[derive(Debug, Clone, Error)]
pub enum RunnerError {
    /// The project catalog has no such project.
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// The runner never accepted a workflow with this identifier.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    /// The submitted workflow was not pending, or a workflow with the same
    /// identifier was accepted before.
    #[error("workflow {0} was already dispatched")]
    AlreadyDispatched(WorkflowId),

    /// The runner has been shut down.
    #[error("workflow runner is shut down")]
    ShutDown,

    /// A template or submitted workflow was rejected.
    #[error(transparent)]
    Domain(#[from] WorkflowDomainError),

    /// The project catalog failed.
    #[error(transparent)]
    Catalog(#[from] ProjectCatalogError),

    /// Registry or run bookkeeping failed.
    #[error("workflow registry error: {0}")]
    Registry(Arc<dyn std::error::Error + Send + Sync>),
}

impl RunnerError {
    /// Wraps a bookkeeping error.
    pub fn registry(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Registry(Arc::new(err))
    }
}

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Builds workflows from templates and runs each on its own tokio task.
///
/// Every run is supervised: a panicking handler fails its workflow instead
/// of vanishing with the task.
pub struct WorkflowRunner<P, N, C>
where
    P: ProjectCatalog,
    N: Notifier + 'static,
    C: Clock + Send + Sync + 'static,
{
    catalog: Arc<P>,
    executor: Arc<WorkflowExecutor<N, C>>,
    notifier: Arc<N>,
    clock: Arc<C>,
    registry: WorkflowRegistry,
    runs: ActiveRuns,
    shutdown: CancellationToken,
}

impl<P, N, C> WorkflowRunner<P, N, C>
where
    P: ProjectCatalog,
    N: Notifier + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a runner.
    #[must_use]
    pub fn new(
        catalog: Arc<P>,
        handlers: Arc<HandlerRegistry>,
        notifier: Arc<N>,
        clock: Arc<C>,
    ) -> Self {
        let executor = WorkflowExecutor::new(handlers, Arc::clone(&notifier), Arc::clone(&clock));
        Self {
            catalog,
            executor: Arc::new(executor),
            notifier,
            clock,
            registry: WorkflowRegistry::new(),
            runs: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns the registry the runner publishes progress to.
    #[must_use]
    pub const fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Starts the planning template against a project.
    ///
    /// # Errors
    ///
    /// See [`WorkflowRunner::execute_template`].
    pub async fn execute_planning_workflow(&self, project_id: ProjectId) -> RunnerResult<Workflow> {
        self.execute_template(WorkflowMode::Planning, project_id)
            .await
    }

    /// Starts the building template against a project.
    ///
    /// # Errors
    ///
    /// See [`WorkflowRunner::execute_template`].
    pub async fn execute_building_workflow(&self, project_id: ProjectId) -> RunnerResult<Workflow> {
        self.execute_template(WorkflowMode::Building, project_id)
            .await
    }

    /// Starts the testing template against a project.
    ///
    /// # Errors
    ///
    /// See [`WorkflowRunner::execute_template`].
    pub async fn execute_testing_workflow(&self, project_id: ProjectId) -> RunnerResult<Workflow> {
        self.execute_template(WorkflowMode::Testing, project_id)
            .await
    }

    /// Starts the refactoring template against a project.
    ///
    /// # Errors
    ///
    /// See [`WorkflowRunner::execute_template`].
    pub async fn execute_refactoring_workflow(
        &self,
        project_id: ProjectId,
    ) -> RunnerResult<Workflow> {
        self.execute_template(WorkflowMode::Refactoring, project_id)
            .await
    }

    /// Builds the template for `mode`, registers it and dispatches it in the
    /// background. Returns the pending snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::ProjectNotFound`] for unknown projects,
    /// [`RunnerError::ShutDown`] after [`WorkflowRunner::shutdown`], or
    /// catalog and registry errors.
    pub async fn execute_template(
        &self,
        mode: WorkflowMode,
        project_id: ProjectId,
    ) -> RunnerResult<Workflow> {
        let project = self.find_project(project_id).await?;
        let workflow = build_workflow(mode, &project, &*self.clock)?;
        self.dispatch(workflow, project)
    }

    /// Dispatches a caller-built pending workflow.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::AlreadyDispatched`] unless the workflow is
    /// pending and its identifier is new to this runner, plus the errors of [`WorkflowRunner::execute_template`].
    pub async fn submit(&self, workflow: Workflow) -> RunnerResult<Workflow> {
        if workflow.status() != WorkflowStatus::Pending {
            return Err(RunnerError::AlreadyDispatched(workflow.id()));
        }
        let project = self.find_project(workflow.project_id()).await?;
        self.dispatch(workflow, project)
    }

    /// Returns the latest snapshot of a workflow.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Registry`] when the registry lock is poisoned.
    pub fn workflow(&self, id: WorkflowId) -> RunnerResult<Option<Workflow>> {
        self.registry.get(id)
    }

    /// Returns every workflow the runner accepted, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Registry`] when the registry lock is poisoned.
    pub fn workflows(&self) -> RunnerResult<Vec<Workflow>> {
        self.registry.list()
    }

    /// Waits for a workflow's run to finish and returns its final state.
    ///
    /// Any number of callers may wait on the same run. A workflow that has
    /// already finished returns its final snapshot straight away.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::WorkflowNotFound`] for unknown workflows.
    pub async fn wait(&self, id: WorkflowId) -> RunnerResult<Workflow> {
        let finished = self.lock_runs()?.get(&id).cloned();
        if let Some(signal) = finished {
            signal.cancelled().await;
        }
        self.registry
            .get(id)?
            .ok_or(RunnerError::WorkflowNotFound(id))
    }

    /// Cancels every run and waits for all of them to settle.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Registry`] when run bookkeeping is poisoned.
    pub async fn shutdown(&self) -> RunnerResult<()> {
        self.shutdown.cancel();
        let active: Vec<CancellationToken> = self.lock_runs()?.values().cloned().collect();
        tracing::info!(active = active.len(), "shutting down workflow runner");
        for finished in active {
            finished.cancelled().await;
        }
        Ok(())
    }

    async fn find_project(&self, project_id: ProjectId) -> RunnerResult<Project> {
        self.catalog
            .find_project(project_id)
            .await?
            .ok_or(RunnerError::ProjectNotFound(project_id))
    }

    fn dispatch(&self, workflow: Workflow, project: Project) -> RunnerResult<Workflow> {
        if self.shutdown.is_cancelled() {
            return Err(RunnerError::ShutDown);
        }
        let workflow_id = workflow.id();
        let mut runs = self.lock_runs()?;
        if !self.registry.register(&workflow)? {
            return Err(RunnerError::AlreadyDispatched(workflow_id));
        }

        let finished = CancellationToken::new();
        let context = StepContext::new(workflow_id, project, self.shutdown.child_token());
        let run = tokio::spawn(run_workflow(
            Arc::clone(&self.executor),
            self.registry.clone(),
            Arc::clone(&self.clock),
            workflow.clone(),
            context,
        ));
        tokio::spawn(supervise(
            workflow_id,
            run,
            Supervision {
                registry: self.registry.clone(),
                notifier: Arc::clone(&self.notifier),
                clock: Arc::clone(&self.clock),
                runs: Arc::clone(&self.runs),
                finished: finished.clone(),
            },
        ));
        runs.insert(workflow_id, finished);
        Ok(workflow)
    }

    /// Returns the number of runs that have not finished yet.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Registry`] when run bookkeeping is poisoned.
    pub fn active_runs(&self) -> RunnerResult<usize> {
        Ok(self.lock_runs()?.len())
    }

    fn lock_runs(&self) -> RunnerResult<MutexGuard<'_, HashMap<WorkflowId, CancellationToken>>> {
        self.runs
            .lock()
            .map_err(|err| RunnerError::registry(std::io::Error::other(err.to_string())))
    }
}

async fn run_workflow<N, C>(
    executor: Arc<WorkflowExecutor<N, C>>,
    registry: WorkflowRegistry,
    clock: Arc<C>,
    mut workflow: Workflow,
    context: StepContext,
) where
    N: Notifier,
    C: Clock + Send + Sync,
{
    let outcome = executor
        .execute_observed(&mut workflow, &context, |snapshot| {
            registry.publish_or_warn(snapshot);
        })
        .await;
    if let Err(err) = outcome {
        tracing::warn!(workflow_id = %workflow.id(), error = %err, "workflow run rejected");
        if workflow.fail(err.to_string(), &*clock).is_ok() {
            registry.publish_or_warn(&workflow);
        }
    }
}

struct Supervision<N, C> {
    registry: WorkflowRegistry,
    notifier: Arc<N>,
    clock: Arc<C>,
    runs: ActiveRuns,
    finished: CancellationToken,
}

/// Awaits a run, records an abnormal exit, then retires the run's entry.
async fn supervise<N, C>(
    workflow_id: WorkflowId,
    run: JoinHandle<()>,
    supervision: Supervision<N, C>,
) where
    N: Notifier,
    C: Clock + Send + Sync,
{
    let Supervision {
        registry,
        notifier,
        clock,
        runs,
        finished,
    } = supervision;
    let _finished = finished.drop_guard();
    if let Err(join_error) = run.await {
        record_abort(
            workflow_id,
            &join_error,
            &registry,
            notifier.as_ref(),
            clock.as_ref(),
        )
        .await;
    }
    match runs.lock() {
        Ok(mut active) => {
            active.remove(&workflow_id);
        }
        Err(err) => {
            tracing::warn!(%workflow_id, error = %err, "finished run not retired");
        }
    }
}

async fn record_abort<N, C>(
    workflow_id: WorkflowId,
    join_error: &JoinError,
    registry: &WorkflowRegistry,
    notifier: &N,
    clock: &C,
) where
    N: Notifier,
    C: Clock + Send + Sync,
{
    let reason = abort_reason(join_error);
    tracing::error!(%workflow_id, reason, "workflow run aborted");
    let failed = registry.update(workflow_id, |workflow| {
        if let Err(err) = workflow.fail(reason, clock) {
            tracing::warn!(%workflow_id, error = %err, "aborted workflow already terminal");
        }
    });
    if let Err(err) = failed {
        tracing::warn!(%workflow_id, error = %err, "aborted workflow not recorded");
    }
    notifier
        .notify(WorkflowEvent::WorkflowFailed {
            workflow_id,
            error: reason.to_owned(),
        })
        .await;
}

fn abort_reason(join_error: &JoinError) -> &'static str {
    if join_error.is_panic() {
        PANIC_FAILURE
    } else {
        ABORT_FAILURE
    }
}

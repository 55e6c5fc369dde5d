//! Linear workflow executor.

use super::HandlerRegistry;
use crate::workflow::{
    domain::{
        ProjectId, Step, StepId, StepStatus, Workflow, WorkflowDomainError, WorkflowId,
        WorkflowStatus,
    },
    ports::{Notifier, StepContext, StepHandlerError, WorkflowEvent},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

/// Errors that prevent the executor from walking a workflow.
///
/// Step failures are not errors here; they are recorded on the workflow.
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// The workflow rejected a transition.
    #[error(transparent)]
    Domain(#[from] WorkflowDomainError),

    /// The context targets a different project than the workflow.
    #[error("workflow {workflow_id} targets project {expected}, context has {actual}")]
    ProjectMismatch {
        /// Workflow identifier.
        workflow_id: WorkflowId,
        /// Project recorded on the workflow.
        expected: ProjectId,
        /// Project supplied in the context.
        actual: ProjectId,
    },
}

/// Result type for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Walks a workflow's steps once, in declaration order.
///
/// A step whose prerequisites did not all complete is skipped. The first
/// failing step fails the workflow and ends the walk; later steps stay
/// pending. Steps that a restored workflow already completed or skipped are
/// left as they are.
pub struct WorkflowExecutor<N, C>
where
    N: Notifier,
    C: Clock + Send + Sync,
{
    handlers: Arc<HandlerRegistry>,
    notifier: Arc<N>,
    clock: Arc<C>,
}

impl<N, C> WorkflowExecutor<N, C>
where
    N: Notifier,
    C: Clock + Send + Sync,
{
    /// Creates an executor dispatching through `handlers`.
    #[must_use]
    pub const fn new(handlers: Arc<HandlerRegistry>, notifier: Arc<N>, clock: Arc<C>) -> Self {
        Self {
            handlers,
            notifier,
            clock,
        }
    }

    /// Executes a pending workflow and returns its terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the workflow is not pending or the
    /// context belongs to another project.
    pub async fn execute(
        &self,
        workflow: &mut Workflow,
        context: &StepContext,
    ) -> ExecutorResult<WorkflowStatus> {
        self.execute_observed(workflow, context, |_| {}).await
    }

    /// Like [`WorkflowExecutor::execute`], calling `observe` after every
    /// state change.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the workflow is not pending or the
    /// context belongs to another project.
    pub async fn execute_observed<F>(
        &self,
        workflow: &mut Workflow,
        context: &StepContext,
        mut observe: F,
    ) -> ExecutorResult<WorkflowStatus>
    where
        F: FnMut(&Workflow) + Send,
    {
        let actual = context.project().id();
        if actual != workflow.project_id() {
            return Err(ExecutorError::ProjectMismatch {
                workflow_id: workflow.id(),
                expected: workflow.project_id(),
                actual,
            });
        }

        let clock = &*self.clock;
        let workflow_id = workflow.id();
        workflow.start(clock)?;
        observe(workflow);
        tracing::info!(
            %workflow_id,
            name = workflow.name(),
            mode = %workflow.mode(),
            "workflow started"
        );
        self.notify(WorkflowEvent::WorkflowStarted {
            workflow_id,
            name: workflow.name().to_owned(),
        })
        .await;

        let step_ids: Vec<StepId> = workflow
            .steps()
            .iter()
            .map(|step| step.id().clone())
            .collect();
        for step_id in step_ids {
            if let Some(error) = self
                .run_step(workflow, step_id, context, &mut observe)
                .await?
            {
                self.notify(WorkflowEvent::WorkflowFailed { workflow_id, error })
                    .await;
                return Ok(WorkflowStatus::Failed);
            }
        }

        workflow.complete(clock)?;
        observe(workflow);
        tracing::info!(%workflow_id, "workflow completed");
        self.notify(WorkflowEvent::WorkflowCompleted { workflow_id })
            .await;
        Ok(WorkflowStatus::Completed)
    }

    /// Skips, or dispatches and records, one step. Returns the failure
    /// message when the step failed.
    async fn run_step<F>(
        &self,
        workflow: &mut Workflow,
        step_id: StepId,
        context: &StepContext,
        observe: &mut F,
    ) -> ExecutorResult<Option<String>>
    where
        F: FnMut(&Workflow) + Send,
    {
        let clock = &*self.clock;
        let workflow_id = workflow.id();

        let restored = workflow
            .step(&step_id)
            .is_some_and(|step| {
                matches!(step.status(), StepStatus::Completed | StepStatus::Skipped)
            });
        if restored {
            return Ok(None);
        }

        if !workflow.dependencies_completed(&step_id) {
            workflow.skip_step(&step_id, clock)?;
            observe(workflow);
            tracing::info!(%workflow_id, %step_id, "step skipped: prerequisites incomplete");
            self.notify(WorkflowEvent::StepSkipped {
                workflow_id,
                step_id,
            })
            .await;
            return Ok(None);
        }

        workflow.start_step(&step_id, clock)?;
        observe(workflow);
        self.notify(WorkflowEvent::StepStarted {
            workflow_id,
            step_id: step_id.clone(),
        })
        .await;

        let step = workflow
            .step(&step_id)
            .cloned()
            .ok_or_else(|| WorkflowDomainError::UnknownStep {
                workflow_id,
                step: step_id.clone(),
            })?;
        match self.dispatch(&step, context).await {
            Ok(output) => {
                workflow.complete_step(&step_id, output, clock)?;
                observe(workflow);
                self.notify(WorkflowEvent::StepCompleted {
                    workflow_id,
                    step_id,
                })
                .await;
                Ok(None)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(%workflow_id, %step_id, error = %message, "workflow step failed");
                workflow.fail_step(&step_id, message.clone(), clock)?;
                observe(workflow);
                self.notify(WorkflowEvent::StepFailed {
                    workflow_id,
                    step_id,
                    error: message.clone(),
                })
                .await;
                Ok(Some(message))
            }
        }
    }

    async fn dispatch(
        &self,
        step: &Step,
        context: &StepContext,
    ) -> Result<String, StepHandlerError> {
        if context.cancellation().is_cancelled() {
            return Err(StepHandlerError::Cancelled);
        }
        let handler = self
            .handlers
            .get(step.action())
            .ok_or(StepHandlerError::NoHandler(step.action()))?;
        handler.handle(step, context).await
    }

    async fn notify(&self, event: WorkflowEvent) {
        self.notifier.notify(event).await;
    }
}

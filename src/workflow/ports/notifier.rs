//! Port for workflow progress notifications.

use crate::workflow::domain::{StepId, WorkflowId};
use async_trait::async_trait;

/// A workflow state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// The walk began.
    WorkflowStarted {
        /// Workflow identifier.
        workflow_id: WorkflowId,
        /// Workflow name.
        name: String,
    },
    /// A step was dispatched.
    StepStarted {
        /// Workflow identifier.
        workflow_id: WorkflowId,
        /// Step identifier.
        step_id: StepId,
    },
    /// A step completed.
    StepCompleted {
        /// Workflow identifier.
        workflow_id: WorkflowId,
        /// Step identifier.
        step_id: StepId,
    },
    /// A step was skipped because a prerequisite did not complete.
    StepSkipped {
        /// Workflow identifier.
        workflow_id: WorkflowId,
        /// Step identifier.
        step_id: StepId,
    },
    /// A step failed.
    StepFailed {
        /// Workflow identifier.
        workflow_id: WorkflowId,
        /// Step identifier.
        step_id: StepId,
        /// Failure message.
        error: String,
    },
    /// The workflow completed.
    WorkflowCompleted {
        /// Workflow identifier.
        workflow_id: WorkflowId,
    },
    /// The workflow failed.
    WorkflowFailed {
        /// Workflow identifier.
        workflow_id: WorkflowId,
        /// Failure message.
        error: String,
    },
}

impl WorkflowEvent {
    /// Returns the workflow the event belongs to.
    #[must_use]
    pub const fn workflow_id(&self) -> WorkflowId {
        match self {
            Self::WorkflowStarted { workflow_id, .. }
            | Self::StepStarted { workflow_id, .. }
            | Self::StepCompleted { workflow_id, .. }
            | Self::StepSkipped { workflow_id, .. }
            | Self::StepFailed { workflow_id, .. }
            | Self::WorkflowCompleted { workflow_id }
            | Self::WorkflowFailed { workflow_id, .. } => *workflow_id,
        }
    }

    /// Returns a stable event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::WorkflowStarted { .. } => "workflow_started",
            Self::StepStarted { .. } => "step_started",
            Self::StepCompleted { .. } => "step_completed",
            Self::StepSkipped { .. } => "step_skipped",
            Self::StepFailed { .. } => "step_failed",
            Self::WorkflowCompleted { .. } => "workflow_completed",
            Self::WorkflowFailed { .. } => "workflow_failed",
        }
    }
}

/// Receives workflow events.
///
/// Delivery is best effort: notifiers report their own failures and never
/// influence the workflow.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one event.
    async fn notify(&self, event: WorkflowEvent);
}

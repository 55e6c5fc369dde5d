//! Notifier that writes workflow events to the tracing subscriber.

use crate::workflow::ports::{Notifier, WorkflowEvent};
use async_trait::async_trait;

/// Logs every workflow event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    /// Creates the notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: WorkflowEvent) {
        let workflow_id = event.workflow_id();
        match &event {
            WorkflowEvent::StepFailed { step_id, error, .. } => {
                tracing::warn!(%workflow_id, %step_id, error, "workflow step failed");
            }
            WorkflowEvent::WorkflowFailed { error, .. } => {
                tracing::warn!(%workflow_id, error, "workflow failed");
            }
            WorkflowEvent::WorkflowStarted { name, .. } => {
                tracing::info!(%workflow_id, name, "workflow started");
            }
            WorkflowEvent::WorkflowCompleted { .. } => {
                tracing::info!(%workflow_id, "workflow completed");
            }
            WorkflowEvent::StepStarted { step_id, .. }
            | WorkflowEvent::StepCompleted { step_id, .. }
            | WorkflowEvent::StepSkipped { step_id, .. } => {
                tracing::debug!(%workflow_id, %step_id, event = event.name(), "workflow step event");
            }
        }
    }
}

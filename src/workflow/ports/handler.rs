//! Step handler port.

use super::GenerationError;
use crate::workflow::domain::{Project, Step, StepAction, StepId, WorkflowId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result type for step handlers.
pub type StepHandlerResult<T> = Result<T, StepHandlerError>;

/// Everything a handler may consult besides the step itself.
#[derive(Debug, Clone)]
pub struct StepContext {
    workflow_id: WorkflowId,
    project: Project,
    cancellation: CancellationToken,
}

impl StepContext {
    /// Creates a context for one workflow run.
    #[must_use]
    pub const fn new(
        workflow_id: WorkflowId,
        project: Project,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            workflow_id,
            project,
            cancellation,
        }
    }

    /// Returns the workflow being executed.
    #[must_use]
    pub const fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    /// Returns the target project.
    #[must_use]
    pub const fn project(&self) -> &Project {
        &self.project
    }

    /// Returns the token that aborts the run.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Executes one kind of step.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Runs `step` and returns its textual output.
    async fn handle(&self, step: &Step, context: &StepContext) -> StepHandlerResult<String>;
}

/// Errors returned by step handlers.
#[derive(Debug, Clone, Error)]
pub enum StepHandlerError {
    /// A command exited unsuccessfully.
    #[error("{kind} execution failed: {status}\nOutput: {output}")]
    CommandFailed {
        /// Command family, such as `command` or `test`.
        kind: &'static str,
        /// Exit status description.
        status: String,
        /// Combined standard output and standard error.
        output: String,
    },

    /// A command could not be spawned or awaited.
    #[error("{kind} execution failed: {source}")]
    Launch {
        /// Command family.
        kind: &'static str,
        /// Underlying IO error.
        source: Arc<std::io::Error>,
    },

    /// A command step carries neither a command nor a description.
    #[error("step {0} has no command to run")]
    MissingCommand(StepId),

    /// The run was cancelled while the step was executing.
    #[error("cancelled")]
    Cancelled,

    /// No handler is registered for the step's action.
    #[error("no handler registered for action {0}")]
    NoHandler(StepAction),

    /// The generation provider failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl StepHandlerError {
    /// Wraps an IO error raised while running a command.
    pub fn launch(kind: &'static str, err: std::io::Error) -> Self {
        Self::Launch {
            kind,
            source: Arc::new(err),
        }
    }
}

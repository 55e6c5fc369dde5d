//! Error types for workflow construction and transitions.

use super::{StepId, StepStatus, WorkflowId, WorkflowStatus};
use thiserror::Error;

/// Errors returned by workflow construction and state transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowDomainError {
    /// The workflow name is empty after trimming.
    #[error("workflow name must not be empty")]
    EmptyName,

    /// A step identifier is empty after trimming.
    #[error("step identifier must not be empty")]
    EmptyStepId,

    /// Two steps share an identifier.
    #[error("duplicate step identifier: {0}")]
    DuplicateStep(StepId),

    /// A step depends on itself or on a step declared after it.
    #[error("step {step} depends on {dependency}, which is not declared before it")]
    ForwardDependency {
        /// Dependent step.
        step: StepId,
        /// Offending prerequisite.
        dependency: StepId,
    },

    /// A step depends on an identifier no step carries.
    #[error("step {step} depends on unknown step {dependency}")]
    UnknownDependency {
        /// Dependent step.
        step: StepId,
        /// Missing prerequisite.
        dependency: StepId,
    },

    /// The workflow has no step with the given identifier.
    #[error("workflow {workflow_id} has no step {step}")]
    UnknownStep {
        /// Workflow identifier.
        workflow_id: WorkflowId,
        /// Requested step.
        step: StepId,
    },

    /// The workflow cannot perform the transition from its current status.
    #[error("cannot {action} workflow {workflow_id} in {status} state")]
    InvalidWorkflowTransition {
        /// Workflow identifier.
        workflow_id: WorkflowId,
        /// Status at the time of the attempt.
        status: WorkflowStatus,
        /// Name of the rejected transition.
        action: &'static str,
    },

    /// The step cannot perform the transition from its current status.
    #[error("cannot {action} step {step} in {status} state")]
    InvalidStepTransition {
        /// Step identifier.
        step: StepId,
        /// Status at the time of the attempt.
        status: StepStatus,
        /// Name of the rejected transition.
        action: &'static str,
    },
}

/// Error returned while parsing workflow enumerations from strings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown workflow {field}: {value}")]
pub struct ParseWorkflowFieldError {
    /// Field being parsed, such as `mode` or `action`.
    pub field: &'static str,
    /// Rejected input.
    pub value: String,
}

impl ParseWorkflowFieldError {
    pub(crate) fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_owned(),
        }
    }
}

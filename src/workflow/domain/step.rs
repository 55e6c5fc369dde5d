//! Workflow steps.

use super::{StepAction, StepId, StepStatus, StepType, WorkflowDomainError};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// One unit of work inside a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    id: StepId,
    name: String,
    description: String,
    command: Option<String>,
    step_type: StepType,
    action: StepAction,
    dependencies: Vec<StepId>,
    status: StepStatus,
    output: Option<String>,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Step {
    /// Creates a pending step.
    #[must_use]
    pub fn new(
        id: impl Into<StepId>,
        name: impl Into<String>,
        step_type: StepType,
        action: StepAction,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            command: None,
            step_type,
            action,
            dependencies: Vec::new(),
            status: StepStatus::Pending,
            output: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Sets the description handed to handlers.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets an explicit shell command for command steps.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Sets prerequisite steps.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StepId>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the step identifier.
    #[must_use]
    pub const fn id(&self) -> &StepId {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the explicit command, if any.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Returns the step classification.
    #[must_use]
    pub const fn step_type(&self) -> StepType {
        self.step_type
    }

    /// Returns the dispatched action.
    #[must_use]
    pub const fn action(&self) -> StepAction {
        self.action
    }

    /// Returns prerequisite step identifiers.
    #[must_use]
    pub fn dependencies(&self) -> &[StepId] {
        &self.dependencies
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> StepStatus {
        self.status
    }

    /// Returns handler output once completed.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Returns the failure message once failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns when the handler was dispatched.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the step reached a terminal status.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub(super) fn start(&mut self, clock: &impl Clock) -> Result<(), WorkflowDomainError> {
        self.expect_status(StepStatus::Pending, "start")?;
        self.status = StepStatus::Running;
        self.started_at = Some(clock.utc());
        Ok(())
    }

    pub(super) fn complete(
        &mut self,
        output: String,
        clock: &impl Clock,
    ) -> Result<(), WorkflowDomainError> {
        self.expect_status(StepStatus::Running, "complete")?;
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.completed_at = Some(clock.utc());
        Ok(())
    }

    pub(super) fn fail(
        &mut self,
        error: String,
        clock: &impl Clock,
    ) -> Result<(), WorkflowDomainError> {
        self.expect_status(StepStatus::Running, "fail")?;
        self.status = StepStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(clock.utc());
        Ok(())
    }

    pub(super) fn skip(&mut self, clock: &impl Clock) -> Result<(), WorkflowDomainError> {
        self.expect_status(StepStatus::Pending, "skip")?;
        self.status = StepStatus::Skipped;
        self.completed_at = Some(clock.utc());
        Ok(())
    }

    fn expect_status(
        &self,
        expected: StepStatus,
        action: &'static str,
    ) -> Result<(), WorkflowDomainError> {
        if self.status == expected {
            return Ok(());
        }
        Err(WorkflowDomainError::InvalidStepTransition {
            step: self.id.clone(),
            status: self.status,
            action,
        })
    }
}

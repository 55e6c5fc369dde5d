//! Workflow aggregate and its lifecycle.

use super::{
    ProjectId, Step, StepId, StepStatus, WorkflowDomainError, WorkflowId, WorkflowMode,
    WorkflowStatus,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Input for constructing a [`Workflow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDraft {
    name: String,
    description: String,
    mode: WorkflowMode,
    project_id: ProjectId,
    steps: Vec<Step>,
}

impl WorkflowDraft {
    /// Starts a draft with no steps.
    #[must_use]
    pub fn new(name: impl Into<String>, mode: WorkflowMode, project_id: ProjectId) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            mode,
            project_id,
            steps: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a step after those already added.
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Appends several steps in order.
    #[must_use]
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }
}

/// An ordered list of steps run against one project.
///
/// Steps may only depend on steps declared before them, so a single pass in
/// declaration order always sees every prerequisite's final status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    id: WorkflowId,
    name: String,
    description: String,
    mode: WorkflowMode,
    project_id: ProjectId,
    steps: Vec<Step>,
    status: WorkflowStatus,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Workflow {
    /// Validates a draft and creates a pending workflow.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError`] when the name is blank, a step
    /// identifier is blank or repeated, or a step depends on anything other
    /// than an earlier step.
    pub fn new(draft: WorkflowDraft, clock: &impl Clock) -> Result<Self, WorkflowDomainError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(WorkflowDomainError::EmptyName);
        }
        validate_steps(&draft.steps)?;

        let now = clock.utc();
        Ok(Self {
            id: WorkflowId::new(),
            name: name.to_owned(),
            description: draft.description,
            mode: draft.mode,
            project_id: draft.project_id,
            steps: draft.steps,
            status: WorkflowStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        })
    }

    /// Returns the workflow identifier.
    #[must_use]
    pub const fn id(&self) -> WorkflowId {
        self.id
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

    /// Returns the template family.
    #[must_use]
    pub const fn mode(&self) -> WorkflowMode {
        self.mode
    }

    /// Returns the project the workflow runs against.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the steps in declaration order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Looks up a step by identifier.
    #[must_use]
    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|step| step.id() == id)
    }

    /// Returns the step currently dispatched, if any.
    #[must_use]
    pub fn running_step(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|step| step.status() == StepStatus::Running)
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// Returns the failure message once failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns when the walk began.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the workflow reached a terminal status.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Reports whether every prerequisite of `id` has completed.
    ///
    /// Unknown steps report `false`.
    #[must_use]
    pub fn dependencies_completed(&self, id: &StepId) -> bool {
        self.step(id).is_some_and(|step| {
            step.dependencies().iter().all(|dependency| {
                self.step(dependency)
                    .is_some_and(|prerequisite| prerequisite.status() == StepStatus::Completed)
            })
        })
    }

    /// Moves a pending workflow to running.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::InvalidWorkflowTransition`] unless the
    /// workflow is pending.
    pub fn start(&mut self, clock: &impl Clock) -> Result<(), WorkflowDomainError> {
        self.expect_status(WorkflowStatus::Pending, "start")?;
        let now = clock.utc();
        self.status = WorkflowStatus::Running;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Marks a step as dispatched.
    ///
    /// # Errors
    ///
    /// Fails when the workflow is not running, the step is unknown, or the
    /// step is not pending.
    pub fn start_step(
        &mut self,
        id: &StepId,
        clock: &impl Clock,
    ) -> Result<(), WorkflowDomainError> {
        self.expect_status(WorkflowStatus::Running, "start a step of")?;
        self.step_mut(id)?.start(clock)?;
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Records a step's output and marks it completed.
    ///
    /// # Errors
    ///
    /// Fails when the workflow is not running, the step is unknown, or the
    /// step is not running.
    pub fn complete_step(
        &mut self,
        id: &StepId,
        output: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), WorkflowDomainError> {
        self.expect_status(WorkflowStatus::Running, "complete a step of")?;
        self.step_mut(id)?.complete(output.into(), clock)?;
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Marks a pending step skipped.
    ///
    /// # Errors
    ///
    /// Fails when the workflow is not running, the step is unknown, or the
    /// step is not pending.
    pub fn skip_step(
        &mut self,
        id: &StepId,
        clock: &impl Clock,
    ) -> Result<(), WorkflowDomainError> {
        self.expect_status(WorkflowStatus::Running, "skip a step of")?;
        self.step_mut(id)?.skip(clock)?;
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Fails a running step and, with it, the workflow.
    ///
    /// # Errors
    ///
    /// Fails when the workflow is not running, the step is unknown, or the
    /// step is not running.
    pub fn fail_step(
        &mut self,
        id: &StepId,
        error: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), WorkflowDomainError> {
        self.expect_status(WorkflowStatus::Running, "fail a step of")?;
        let message = error.into();
        self.step_mut(id)?.fail(message.clone(), clock)?;
        self.mark_failed(message, clock);
        Ok(())
    }

    /// Completes a running workflow whose steps all completed or were
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::InvalidWorkflowTransition`] when the
    /// workflow is not running or a step has not finished successfully.
    pub fn complete(&mut self, clock: &impl Clock) -> Result<(), WorkflowDomainError> {
        self.expect_status(WorkflowStatus::Running, "complete")?;
        let all_done = self
            .steps
            .iter()
            .all(|step| matches!(step.status(), StepStatus::Completed | StepStatus::Skipped));
        if !all_done {
            return Err(self.invalid("complete"));
        }
        let now = clock.utc();
        self.status = WorkflowStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Fails a workflow that has not finished, failing the running step
    /// with the same reason.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowDomainError::InvalidWorkflowTransition`] when the
    /// workflow is already terminal.
    pub fn fail(
        &mut self,
        reason: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), WorkflowDomainError> {
        if self.status.is_terminal() {
            return Err(self.invalid("fail"));
        }
        let message = reason.into();
        if let Some(step) = self
            .steps
            .iter_mut()
            .find(|step| step.status() == StepStatus::Running)
        {
            step.fail(message.clone(), clock)?;
        }
        self.mark_failed(message, clock);
        Ok(())
    }

    fn mark_failed(&mut self, error: String, clock: &impl Clock) {
        let now = clock.utc();
        self.status = WorkflowStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    fn step_mut(&mut self, id: &StepId) -> Result<&mut Step, WorkflowDomainError> {
        let workflow_id = self.id;
        self.steps
            .iter_mut()
            .find(|step| step.id() == id)
            .ok_or_else(|| WorkflowDomainError::UnknownStep {
                workflow_id,
                step: id.clone(),
            })
    }

    fn expect_status(
        &self,
        expected: WorkflowStatus,
        action: &'static str,
    ) -> Result<(), WorkflowDomainError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    const fn invalid(&self, action: &'static str) -> WorkflowDomainError {
        WorkflowDomainError::InvalidWorkflowTransition {
            workflow_id: self.id,
            status: self.status,
            action,
        }
    }
}

fn validate_steps(steps: &[Step]) -> Result<(), WorkflowDomainError> {
    let all_ids: BTreeSet<&StepId> = steps.iter().map(Step::id).collect();
    let mut declared: BTreeSet<&StepId> = BTreeSet::new();
    for step in steps {
        if step.id().as_str().trim().is_empty() {
            return Err(WorkflowDomainError::EmptyStepId);
        }
        for dependency in step.dependencies() {
            if declared.contains(dependency) {
                continue;
            }
            return Err(if all_ids.contains(dependency) {
                WorkflowDomainError::ForwardDependency {
                    step: step.id().clone(),
                    dependency: dependency.clone(),
                }
            } else {
                WorkflowDomainError::UnknownDependency {
                    step: step.id().clone(),
                    dependency: dependency.clone(),
                }
            });
        }
        if !declared.insert(step.id()) {
            return Err(WorkflowDomainError::DuplicateStep(step.id().clone()));
        }
    }
    Ok(())
}

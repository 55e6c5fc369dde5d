//! Shared view of submitted workflows.

use super::{RunnerError, RunnerResult};
use crate::workflow::domain::{Workflow, WorkflowId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Latest known state of every workflow a runner accepted.
#[derive(Debug, Clone, Default)]
pub struct WorkflowRegistry {
    workflows: Arc<RwLock<HashMap<WorkflowId, Workflow>>>,
}

impl WorkflowRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a snapshot, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Registry`] when the lock is poisoned.
    pub fn publish(&self, workflow: &Workflow) -> RunnerResult<()> {
        let mut workflows = self
            .workflows
            .write()
            .map_err(|err| RunnerError::registry(std::io::Error::other(err.to_string())))?;
        workflows.insert(workflow.id(), workflow.clone());
        Ok(())
    }

    /// Stores a snapshot only when no workflow with its identifier is known.
    /// Returns `false`, leaving the stored snapshot untouched, otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Registry`] when the lock is poisoned.
    pub fn register(&self, workflow: &Workflow) -> RunnerResult<bool> {
        let mut workflows = self
            .workflows
            .write()
            .map_err(|err| RunnerError::registry(std::io::Error::other(err.to_string())))?;
        if workflows.contains_key(&workflow.id()) {
            return Ok(false);
        }
        workflows.insert(workflow.id(), workflow.clone());
        Ok(true)
    }

    /// Publishes a snapshot from a context that cannot propagate errors.
    pub(crate) fn publish_or_warn(&self, workflow: &Workflow) {
        if let Err(err) = self.publish(workflow) {
            tracing::warn!(
                workflow_id = %workflow.id(),
                error = %err,
                "workflow progress not published"
            );
        }
    }

    /// Returns the latest snapshot of a workflow.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Registry`] when the lock is poisoned.
    pub fn get(&self, id: WorkflowId) -> RunnerResult<Option<Workflow>> {
        let workflows = self
            .workflows
            .read()
            .map_err(|err| RunnerError::registry(std::io::Error::other(err.to_string())))?;
        Ok(workflows.get(&id).cloned())
    }

    /// Returns every workflow, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Registry`] when the lock is poisoned.
    pub fn list(&self) -> RunnerResult<Vec<Workflow>> {
        let workflows = self
            .workflows
            .read()
            .map_err(|err| RunnerError::registry(std::io::Error::other(err.to_string())))?;
        let mut snapshot: Vec<Workflow> = workflows.values().cloned().collect();
        snapshot.sort_by_key(|workflow| (workflow.created_at(), workflow.id()));
        Ok(snapshot)
    }

    /// Applies `update` to a stored workflow. Returns `false` when the
    /// workflow is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Registry`] when the lock is poisoned.
    pub fn update<F>(&self, id: WorkflowId, update: F) -> RunnerResult<bool>
    where
        F: FnOnce(&mut Workflow),
    {
        let mut workflows = self
            .workflows
            .write()
            .map_err(|err| RunnerError::registry(std::io::Error::other(err.to_string())))?;
        Ok(workflows.get_mut(&id).map(update).is_some())
    }
}

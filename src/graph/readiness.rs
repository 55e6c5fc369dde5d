//! Scheduling pass that promotes satisfied tasks to ready.

use super::{DependencyGraph, GraphError};
use crate::task::domain::{Task, TaskId, TaskStatus};
use mockable::Clock;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Evaluates readiness over a set of tasks.
#[derive(Debug, Clone)]
pub struct ReadinessScheduler<C> {
    clock: Arc<C>,
}

impl<C> ReadinessScheduler<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a scheduler stamping transitions with `clock`.
    #[must_use]
    pub const fn new(clock: Arc<C>) -> Self {
        Self { clock }
    }

    /// Runs one scheduling pass.
    ///
    /// Pending tasks whose prerequisites are all in `completed` (or are
    /// completed members of `tasks`) become ready. Returns the ready queue,
    /// highest priority first and oldest first within a priority.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] and leaves every task untouched when the
    /// dependency graph is cyclic or references unknown tasks.
    pub fn schedule(
        &self,
        tasks: &mut [Task],
        completed: &BTreeSet<TaskId>,
    ) -> Result<Vec<TaskId>, GraphError> {
        let mut satisfied = completed.clone();
        satisfied.extend(
            tasks
                .iter()
                .filter(|task| task.status() == TaskStatus::Completed)
                .map(Task::id),
        );

        let mut graph = DependencyGraph::from_tasks(tasks.iter());
        graph.add_satisfied(satisfied.iter().copied());
        graph.validate()?;

        for task in tasks.iter_mut() {
            if task.mark_ready(&satisfied, &*self.clock) {
                tracing::debug!(task_id = %task.id(), "task became ready");
            }
        }
        let mut queue: Vec<&Task> = tasks
            .iter()
            .filter(|task| task.status() == TaskStatus::Ready && task.is_ready(&satisfied))
            .collect();
        queue.sort_by_key(|task| (Reverse(task.priority()), task.created_at()));
        Ok(queue.into_iter().map(Task::id).collect())
    }
}

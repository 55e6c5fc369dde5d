//! Directed dependency graph over task identifiers.

use crate::task::domain::{Task, TaskId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;

/// Errors returned by dependency graph validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A task lists itself as a prerequisite.
    #[error("task {0} depends on itself")]
    SelfDependency(TaskId),

    /// A task depends on an identifier absent from the graph.
    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency {
        /// Dependent task.
        task: TaskId,
        /// Missing prerequisite.
        dependency: TaskId,
    },

    /// The graph contains a cycle.
    #[error("dependency cycle among tasks: {}", format_ids(.0))]
    Cycle(Vec<TaskId>),
}

fn format_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Task dependency graph with forward and reverse edges.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    dependencies: BTreeMap<TaskId, Vec<TaskId>>,
    dependents: BTreeMap<TaskId, Vec<TaskId>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from each task's static prerequisites.
    #[must_use]
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut graph = Self::new();
        for task in tasks {
            graph.add_task(task.id(), task.depends_on());
        }
        graph
    }

    /// Adds a task and its prerequisites. Re-adding a task replaces its
    /// edges.
    pub fn add_task(&mut self, id: TaskId, depends_on: &[TaskId]) {
        if let Some(previous) = self.dependencies.insert(id, depends_on.to_vec()) {
            for dependency in previous {
                if let Some(reverse) = self.dependents.get_mut(&dependency) {
                    reverse.retain(|dependent| *dependent != id);
                }
            }
        }
        for dependency in depends_on {
            self.dependents.entry(*dependency).or_default().push(id);
        }
    }

    /// Registers tasks that are already satisfied and have no edges of
    /// their own, such as completed work outside the scheduled set.
    pub fn add_satisfied(&mut self, ids: impl IntoIterator<Item = TaskId>) {
        for id in ids {
            self.dependencies.entry(id).or_default();
        }
    }

    /// Returns the number of tasks in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Returns `true` when the graph holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Returns the prerequisites of a task.
    #[must_use]
    pub fn dependencies_of(&self, id: TaskId) -> &[TaskId] {
        self.dependencies.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the tasks that depend on `id`.
    #[must_use]
    pub fn dependents_of(&self, id: TaskId) -> &[TaskId] {
        self.dependents.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Checks that every dependency is known and the graph is acyclic.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.topological_order().map(|_| ())
    }

    /// Orders tasks so every prerequisite precedes its dependents.
    ///
    /// The order is deterministic for a given graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::SelfDependency`],
    /// [`GraphError::UnknownDependency`], or [`GraphError::Cycle`].
    pub fn topological_order(&self) -> Result<Vec<TaskId>, GraphError> {
        let mut in_degree = BTreeMap::new();
        for (task, dependencies) in &self.dependencies {
            for dependency in dependencies {
                if dependency == task {
                    return Err(GraphError::SelfDependency(*task));
                }
                if !self.dependencies.contains_key(dependency) {
                    return Err(GraphError::UnknownDependency {
                        task: *task,
                        dependency: *dependency,
                    });
                }
            }
            in_degree.insert(*task, dependencies.len());
        }

        let mut queue: VecDeque<TaskId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(in_degree.len());

        while let Some(id) = queue.pop_front() {
            order.push(id);
            for dependent in self.dependents_of(id) {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(*dependent);
                    }
                }
            }
        }

        if order.len() < in_degree.len() {
            let ordered: BTreeSet<TaskId> = order.into_iter().collect();
            let stuck = in_degree
                .into_keys()
                .filter(|id| !ordered.contains(id))
                .collect();
            return Err(GraphError::Cycle(stuck));
        }
        Ok(order)
    }
}

//! Dependency graph validation and readiness scheduling for tasks.
//!
//! Task dependencies form a directed graph that must be acyclic before any
//! task is scheduled; otherwise mutually dependent tasks would wait in
//! `pending` forever.

mod dependency;
mod readiness;

pub use dependency::{DependencyGraph, GraphError};
pub use readiness::ReadinessScheduler;

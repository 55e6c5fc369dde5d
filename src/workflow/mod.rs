//! Workflow execution for project-level development pipelines.
//!
//! A workflow is an ordered list of steps run against a single project.
//! The module follows hexagonal architecture:
//!
//! - Workflows, steps, projects and templates in [`domain`]
//! - Step handler, generation, notification and project catalog ports in
//!   [`ports`]
//! - Process-backed handlers, a tracing notifier and an in-memory project
//!   catalog in [`adapters`]
//! - The linear executor and the supervised runner in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;

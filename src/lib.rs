//! Helix orchestrator: durable task and workflow orchestration for AI
//! development work.
//!
//! The crate tracks tasks across a pool of workers, runs project workflows
//! step by step, and snapshots in-process state so it survives restarts.
//!
//! # Architecture
//!
//! Modules follow hexagonal architecture principles:
//!
//! - **Domain**: entities and pure state transitions
//! - **Ports**: trait seams for storage, step handlers, generation and
//!   notification
//! - **Adapters**: in-memory, `PostgreSQL`, process and tracing
//!   implementations of those ports
//! - **Services**: orchestration over the ports
//!
//! # Modules
//!
//! - [`task`]: task lifecycle and compare-and-swap task storage
//! - [`graph`]: dependency validation and readiness scheduling
//! - [`workflow`]: project workflows, templates, executor and runner
//! - [`persistence`]: snapshot export, import, backup and auto-save
//! - [`config`]: file and environment configuration
//! - [`telemetry`]: tracing subscriber setup

pub mod config;
pub mod graph;
pub mod persistence;
pub mod task;
pub mod telemetry;
pub mod workflow;

#[cfg(test)]
mod test_support;

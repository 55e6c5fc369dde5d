//! Workflow orchestration services.

mod executor;
mod handlers;
mod registry;
mod runner;

pub use executor::{ExecutorError, ExecutorResult, WorkflowExecutor};
pub use handlers::HandlerRegistry;
pub use registry::WorkflowRegistry;
pub use runner::{ABORT_FAILURE, PANIC_FAILURE, RunnerError, RunnerResult, WorkflowRunner};

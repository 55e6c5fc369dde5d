//! Port contracts for workflow execution.

mod generation;
mod handler;
mod notifier;
mod project;

pub use generation::{
    GenerationError, GenerationProvider, GenerationRequest, GenerationResponse, GenerationResult,
};
pub use handler::{StepContext, StepHandler, StepHandlerError, StepHandlerResult};
#[cfg(test)]
pub use notifier::MockNotifier;
pub use notifier::{Notifier, WorkflowEvent};
pub use project::{ProjectCatalog, ProjectCatalogError, ProjectCatalogResult};

//! Domain model for workflows, their steps and the projects they target.

mod error;
mod ids;
mod kinds;
mod project;
mod step;
mod templates;
mod workflow;

pub use error::{ParseWorkflowFieldError, WorkflowDomainError};
pub use ids::{ProjectId, StepId, WorkflowId};
pub use kinds::{StepAction, StepStatus, StepType, WorkflowMode, WorkflowStatus};
pub use project::{Project, ProjectCommands, ProjectType, ToolchainCommand};
pub use step::Step;
pub use templates::build_workflow;
pub use workflow::{Workflow, WorkflowDraft};

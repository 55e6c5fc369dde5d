//! Adapter implementations of the workflow ports.

mod command;
mod generation;
mod memory;
mod notifier;
mod process;

pub use command::{CommandHandler, ToolchainHandler};
pub use generation::GenerationHandler;
pub use memory::{InMemoryProjectCatalog, detect_project_type};
pub use notifier::TracingNotifier;

use crate::workflow::{domain::StepAction, ports::GenerationProvider, services::HandlerRegistry};
use std::sync::Arc;

/// Builds a registry covering every [`StepAction`] with the process-backed
/// handlers and a generation handler around `provider`.
#[must_use]
pub fn standard_handlers(provider: Option<Arc<dyn GenerationProvider>>) -> HandlerRegistry {
    let generation = Arc::new(
        provider.map_or_else(GenerationHandler::placeholder, GenerationHandler::new),
    );
    let toolchain = Arc::new(ToolchainHandler::new());
    HandlerRegistry::new()
        .with_handler(StepAction::AnalyzeCode, generation.clone())
        .with_handler(StepAction::GenerateCode, generation)
        .with_handler(StepAction::ExecuteCommand, Arc::new(CommandHandler::new()))
        .with_handler(StepAction::RunTests, toolchain.clone())
        .with_handler(StepAction::LintCode, toolchain.clone())
        .with_handler(StepAction::BuildProject, toolchain)
}

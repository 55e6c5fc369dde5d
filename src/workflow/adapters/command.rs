//! Handlers that run shell commands in the project directory.

use super::process::run_shell;
use crate::workflow::{
    domain::{Step, StepAction, ToolchainCommand},
    ports::{StepContext, StepHandler, StepHandlerError, StepHandlerResult},
};
use async_trait::async_trait;

/// Runs a step's explicit command, or its description when no command is
/// set, through `bash -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandHandler;

impl CommandHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepHandler for CommandHandler {
    async fn handle(&self, step: &Step, context: &StepContext) -> StepHandlerResult<String> {
        let command = step.command().unwrap_or_else(|| step.description()).trim();
        if command.is_empty() {
            return Err(StepHandlerError::MissingCommand(step.id().clone()));
        }
        run_shell(
            "command",
            command,
            context.project().path(),
            context.cancellation(),
        )
        .await
    }
}

/// Runs the project's test, lint or build command.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolchainHandler;

impl ToolchainHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    const fn toolchain_command(action: StepAction) -> Option<ToolchainCommand> {
        match action {
            StepAction::RunTests => Some(ToolchainCommand::Test),
            StepAction::LintCode => Some(ToolchainCommand::Lint),
            StepAction::BuildProject => Some(ToolchainCommand::Build),
            StepAction::AnalyzeCode | StepAction::GenerateCode | StepAction::ExecuteCommand => {
                None
            }
        }
    }
}

#[async_trait]
impl StepHandler for ToolchainHandler {
    async fn handle(&self, step: &Step, context: &StepContext) -> StepHandlerResult<String> {
        let kind = Self::toolchain_command(step.action())
            .ok_or(StepHandlerError::NoHandler(step.action()))?;
        let project = context.project();
        run_shell(
            kind.as_str(),
            project.command(kind),
            project.path(),
            context.cancellation(),
        )
        .await
    }
}

//! Enumerations describing workflows and their steps.

use super::ParseWorkflowFieldError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Template family a workflow was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    /// Requirements analysis and architecture generation.
    Planning,
    /// Environment setup and compilation.
    Building,
    /// Unit and integration test runs.
    Testing,
    /// Codebase analysis and refactoring.
    Refactoring,
    /// Caller-assembled steps.
    Custom,
}

impl WorkflowMode {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Building => "building",
            Self::Testing => "testing",
            Self::Refactoring => "refactoring",
            Self::Custom => "custom",
        }
    }
}

impl TryFrom<&str> for WorkflowMode {
    type Error = ParseWorkflowFieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "planning" => Ok(Self::Planning),
            "building" => Ok(Self::Building),
            "testing" => Ok(Self::Testing),
            "refactoring" => Ok(Self::Refactoring),
            "custom" => Ok(Self::Custom),
            _ => Err(ParseWorkflowFieldError::new("mode", value)),
        }
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Built but not yet dispatched.
    Pending,
    /// Steps are being walked.
    Running,
    /// Every step completed or was skipped.
    Completed,
    /// A step failed and halted the walk.
    Failed,
}

impl WorkflowStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` once the workflow can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not reached yet, or left behind by an earlier failure.
    Pending,
    /// Handler dispatched.
    Running,
    /// Handler returned output.
    Completed,
    /// Handler returned an error.
    Failed,
    /// Not executed because a prerequisite did not complete.
    Skipped,
}

impl StepStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad classification of what a step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Reads and summarises.
    Analysis,
    /// Produces code or designs.
    Generation,
    /// Runs commands.
    Execution,
    /// Checks results.
    Validation,
}

impl StepType {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Generation => "generation",
            Self::Execution => "execution",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete operation a step dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Analyse code or requirements through the generation provider.
    AnalyzeCode,
    /// Generate code or designs through the generation provider.
    GenerateCode,
    /// Run a shell command in the project directory.
    ExecuteCommand,
    /// Run the project's test command.
    RunTests,
    /// Run the project's lint command.
    LintCode,
    /// Run the project's build command.
    BuildProject,
}

impl StepAction {
    /// Every action, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::AnalyzeCode,
        Self::GenerateCode,
        Self::ExecuteCommand,
        Self::RunTests,
        Self::LintCode,
        Self::BuildProject,
    ];

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AnalyzeCode => "analyze_code",
            Self::GenerateCode => "generate_code",
            Self::ExecuteCommand => "execute_command",
            Self::RunTests => "run_tests",
            Self::LintCode => "lint_code",
            Self::BuildProject => "build_project",
        }
    }
}

impl TryFrom<&str> for StepAction {
    type Error = ParseWorkflowFieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == value.trim().to_ascii_lowercase())
            .ok_or_else(|| ParseWorkflowFieldError::new("action", value))
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

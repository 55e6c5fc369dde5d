//! Built-in workflow templates.

use super::{
    Project, Step, StepAction, StepType, ToolchainCommand, Workflow, WorkflowDomainError,
    WorkflowDraft, WorkflowMode,
};
use mockable::Clock;

/// Builds the built-in workflow for `mode` against `project`.
///
/// [`WorkflowMode::Custom`] has no template and yields a workflow without
/// steps, which completes as soon as it runs.
///
/// # Errors
///
/// Returns [`WorkflowDomainError`] only if a template is malformed.
pub fn build_workflow(
    mode: WorkflowMode,
    project: &Project,
    clock: &impl Clock,
) -> Result<Workflow, WorkflowDomainError> {
    let draft = match mode {
        WorkflowMode::Planning => planning(project),
        WorkflowMode::Building => building(project),
        WorkflowMode::Testing => testing(project),
        WorkflowMode::Refactoring => refactoring(project),
        WorkflowMode::Custom => {
            WorkflowDraft::new(format!("Custom workflow: {}", project.name()), mode, project.id())
        }
    };
    Workflow::new(draft, clock)
}

fn planning(project: &Project) -> WorkflowDraft {
    WorkflowDraft::new("Project Architecture Planning", WorkflowMode::Planning, project.id())
        .with_description("Generate system architecture and design for project")
        .with_step(
            Step::new(
                "analyze_requirements",
                "Analyze Requirements",
                StepType::Analysis,
                StepAction::AnalyzeCode,
            )
            .with_description("Analyze project requirements and constraints"),
        )
        .with_step(
            Step::new(
                "generate_architecture",
                "Generate Architecture",
                StepType::Generation,
                StepAction::GenerateCode,
            )
            .with_description("Generate system architecture and design")
            .with_dependencies(["analyze_requirements"]),
        )
}

fn building(project: &Project) -> WorkflowDraft {
    WorkflowDraft::new("Project Build", WorkflowMode::Building, project.id())
        .with_description("Build and compile project")
        .with_step(
            Step::new(
                "setup_environment",
                "Setup Environment",
                StepType::Execution,
                StepAction::ExecuteCommand,
            )
            .with_description("Setup build environment and dependencies")
            .with_command(project.command(ToolchainCommand::Setup)),
        )
        .with_step(
            Step::new(
                "compile_code",
                "Compile Code",
                StepType::Execution,
                StepAction::BuildProject,
            )
            .with_description(project.command(ToolchainCommand::Build))
            .with_dependencies(["setup_environment"]),
        )
}

fn testing(project: &Project) -> WorkflowDraft {
    WorkflowDraft::new("Project Testing", WorkflowMode::Testing, project.id())
        .with_description("Run comprehensive test suite")
        .with_step(
            Step::new(
                "unit_tests",
                "Unit Tests",
                StepType::Execution,
                StepAction::RunTests,
            )
            .with_description("Run unit tests"),
        )
        .with_step(
            Step::new(
                "integration_tests",
                "Integration Tests",
                StepType::Execution,
                StepAction::RunTests,
            )
            .with_description("Run integration tests")
            .with_dependencies(["unit_tests"]),
        )
}

fn refactoring(project: &Project) -> WorkflowDraft {
    WorkflowDraft::new("Code Refactoring", WorkflowMode::Refactoring, project.id())
        .with_description("Refactor and improve code quality")
        .with_step(
            Step::new(
                "analyze_codebase",
                "Analyze Codebase",
                StepType::Analysis,
                StepAction::AnalyzeCode,
            )
            .with_description("Analyze codebase for refactoring opportunities"),
        )
        .with_step(
            Step::new(
                "refactor_code",
                "Refactor Code",
                StepType::Generation,
                StepAction::GenerateCode,
            )
            .with_description("Perform code refactoring")
            .with_dependencies(["analyze_codebase"]),
        )
}

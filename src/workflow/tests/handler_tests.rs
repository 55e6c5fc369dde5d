//! Tests for the process-backed and generation step handlers.

use crate::workflow::{
    adapters::{CommandHandler, GenerationHandler, ToolchainHandler, detect_project_type},
    domain::{Project, ProjectType, Step, StepAction, StepType, ToolchainCommand, WorkflowId},
    ports::{
        GenerationError, GenerationProvider, GenerationRequest, GenerationResponse,
        GenerationResult, StepContext, StepHandler, StepHandlerError,
    },
};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use eyre::{WrapErr, ensure};
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct ProjectDir {
    _dir: tempfile::TempDir,
    path: Utf8PathBuf,
}

#[fixture]
fn project_dir() -> ProjectDir {
    let dir = tempfile::tempdir().expect("temporary directory");
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("UTF-8 temp path");
    ProjectDir { _dir: dir, path }
}

fn context(project: Project) -> StepContext {
    StepContext::new(WorkflowId::new(), project, CancellationToken::new())
}

fn shell_step(command: &str) -> Step {
    Step::new("run", "Run", StepType::Execution, StepAction::ExecuteCommand).with_command(command)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn command_runs_in_the_project_directory(project_dir: ProjectDir) -> eyre::Result<()> {
    std::fs::write(project_dir.path.join("marker.txt"), "present")?;
    let project = Project::new("demo", project_dir.path.clone(), ProjectType::Generic);

    let output = CommandHandler::new()
        .handle(&shell_step("cat marker.txt"), &context(project))
        .await
        .wrap_err("command should succeed")?;

    ensure!(output == "present", "unexpected output {output:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn command_falls_back_to_the_description(project_dir: ProjectDir) -> eyre::Result<()> {
    let project = Project::new("demo", project_dir.path.clone(), ProjectType::Generic);
    let step = Step::new("echo", "Echo", StepType::Execution, StepAction::ExecuteCommand)
        .with_description("echo from-description");

    let output = CommandHandler::new().handle(&step, &context(project)).await?;

    ensure!(output.trim() == "from-description", "unexpected output {output:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_command_reports_combined_output(project_dir: ProjectDir) {
    let project = Project::new("demo", project_dir.path.clone(), ProjectType::Generic);

    let err = CommandHandler::new()
        .handle(
            &shell_step("echo to-stdout; echo to-stderr >&2; exit 3"),
            &context(project),
        )
        .await
        .expect_err("non-zero exit should fail");

    let message = err.to_string();
    assert!(message.starts_with("command execution failed: "), "{message}");
    assert!(message.contains("\nOutput: "), "{message}");
    assert!(message.contains("to-stdout") && message.contains("to-stderr"), "{message}");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancellation_stops_a_running_command(project_dir: ProjectDir) {
    let project = Project::new("demo", project_dir.path.clone(), ProjectType::Generic);
    let run_context = context(project);
    let token = run_context.cancellation().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        CommandHandler::new().handle(&shell_step("sleep 30"), &run_context),
    )
    .await;

    assert!(matches!(result, Ok(Err(StepHandlerError::Cancelled))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn toolchain_prefers_project_override(project_dir: ProjectDir) -> eyre::Result<()> {
    let project = Project::new("demo", project_dir.path.clone(), ProjectType::Rust)
        .with_command(ToolchainCommand::Test, "echo overridden-tests");
    let step = Step::new("unit", "Unit", StepType::Execution, StepAction::RunTests);

    let output = ToolchainHandler::new().handle(&step, &context(project)).await?;

    ensure!(output.trim() == "overridden-tests", "unexpected output {output:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn toolchain_failure_is_labelled_by_kind(project_dir: ProjectDir) {
    let project = Project::new("demo", project_dir.path.clone(), ProjectType::Generic)
        .with_command(ToolchainCommand::Lint, "exit 1");
    let step = Step::new("lint", "Lint", StepType::Validation, StepAction::LintCode);

    let err = ToolchainHandler::new()
        .handle(&step, &context(project))
        .await
        .expect_err("lint should fail");

    assert!(err.to_string().starts_with("lint execution failed"), "{err}");
}

#[rstest]
#[case(StepAction::AnalyzeCode, "Analysis completed for: read the code")]
#[case(StepAction::GenerateCode, "Code generation completed for: read the code")]
#[tokio::test(flavor = "multi_thread")]
async fn generation_without_provider_returns_placeholder(
    #[case] action: StepAction,
    #[case] expected: &str,
) -> eyre::Result<()> {
    let project = Project::new("demo", "/srv/demo", ProjectType::Generic);
    let step =
        Step::new("think", "Think", StepType::Analysis, action).with_description("read the code");

    let output = GenerationHandler::placeholder()
        .handle(&step, &context(project))
        .await?;

    ensure!(output == expected, "unexpected output {output:?}");
    Ok(())
}

struct EchoProvider;

#[async_trait]
impl GenerationProvider for EchoProvider {
    async fn generate(&self, request: GenerationRequest) -> GenerationResult<GenerationResponse> {
        if request.prompt.is_empty() {
            return Err(GenerationError::Rejected("empty prompt".to_owned()));
        }
        Ok(GenerationResponse {
            content: format!("{} for {}", request.prompt, request.project_name),
        })
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn generation_uses_the_provider() -> eyre::Result<()> {
    let handler = GenerationHandler::new(Arc::new(EchoProvider));
    let project = Project::new("demo", "/srv/demo", ProjectType::Generic);
    let step = Step::new("gen", "Gen", StepType::Generation, StepAction::GenerateCode)
        .with_description("design it");

    let output = handler.handle(&step, &context(project.clone())).await?;
    ensure!(output == "design it for demo", "unexpected output {output:?}");

    let empty = Step::new("gen", "Gen", StepType::Generation, StepAction::GenerateCode);
    let rejected = handler.handle(&empty, &context(project)).await;
    ensure!(
        matches!(rejected, Err(StepHandlerError::Generation(GenerationError::Rejected(_)))),
        "provider rejection should surface"
    );
    Ok(())
}

#[rstest]
#[case("go.mod", ProjectType::Go)]
#[case("package.json", ProjectType::Node)]
#[case("requirements.txt", ProjectType::Python)]
#[case("Cargo.toml", ProjectType::Rust)]
#[case("README.md", ProjectType::Generic)]
fn project_type_is_detected_from_manifest(
    project_dir: ProjectDir,
    #[case] manifest: &str,
    #[case] expected: ProjectType,
) -> eyre::Result<()> {
    std::fs::write(project_dir.path.join(manifest), "")?;
    let detected = detect_project_type(&project_dir.path)?;
    ensure!(detected == expected, "detected {detected} for {manifest}");
    Ok(())
}

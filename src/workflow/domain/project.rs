//! Projects that workflows run against.

use super::{ParseWorkflowFieldError, ProjectId};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Language toolchain a project uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    /// Go module.
    Go,
    /// Node.js package.
    Node,
    /// Python package.
    Python,
    /// Cargo package.
    Rust,
    /// No recognised toolchain.
    #[default]
    Generic,
}

impl ProjectType {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::Node => "node",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Generic => "generic",
        }
    }

    /// Returns the manifest file whose presence identifies the toolchain.
    #[must_use]
    pub const fn marker_file(self) -> Option<&'static str> {
        match self {
            Self::Go => Some("go.mod"),
            Self::Node => Some("package.json"),
            Self::Python => Some("requirements.txt"),
            Self::Rust => Some("Cargo.toml"),
            Self::Generic => None,
        }
    }

    /// Returns the built-in shell command for a toolchain operation.
    #[must_use]
    pub const fn default_command(self, kind: ToolchainCommand) -> &'static str {
        match (self, kind) {
            (Self::Go, ToolchainCommand::Setup) => "go mod download",
            (Self::Go, ToolchainCommand::Test) => "go test ./...",
            (Self::Go, ToolchainCommand::Lint) => "gofmt -l .",
            (Self::Go, ToolchainCommand::Build) => "go build",
            (Self::Node, ToolchainCommand::Setup) => "npm install",
            (Self::Node, ToolchainCommand::Test) => "npm test",
            (Self::Node, ToolchainCommand::Lint) => "npm run lint",
            (Self::Node, ToolchainCommand::Build) => "npm run build",
            (Self::Python, ToolchainCommand::Setup) => "python -m pip install -r requirements.txt",
            (Self::Python, ToolchainCommand::Test) => "python -m pytest",
            (Self::Python, ToolchainCommand::Lint) => "flake8 .",
            (Self::Python, ToolchainCommand::Build) => "python setup.py build",
            (Self::Rust, ToolchainCommand::Setup) => "cargo fetch",
            (Self::Rust, ToolchainCommand::Test) => "cargo test",
            (Self::Rust, ToolchainCommand::Lint) => "cargo clippy",
            (Self::Rust, ToolchainCommand::Build) => "cargo build",
            (Self::Generic, ToolchainCommand::Setup) => "echo 'No setup command configured'",
            (Self::Generic, ToolchainCommand::Test) => "echo 'No test command configured'",
            (Self::Generic, ToolchainCommand::Lint) => "echo 'No lint command configured'",
            (Self::Generic, ToolchainCommand::Build) => "echo 'No build command configured'",
        }
    }
}

impl TryFrom<&str> for ProjectType {
    type Error = ParseWorkflowFieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "go" => Ok(Self::Go),
            "node" => Ok(Self::Node),
            "python" => Ok(Self::Python),
            "rust" => Ok(Self::Rust),
            "generic" => Ok(Self::Generic),
            _ => Err(ParseWorkflowFieldError::new("project type", value)),
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Toolchain operation a project can override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolchainCommand {
    /// Fetch dependencies and prepare the environment.
    Setup,
    /// Run the test suite.
    Test,
    /// Run the linter.
    Lint,
    /// Compile or package.
    Build,
}

impl ToolchainCommand {
    /// Returns the label used in failure messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Test => "test",
            Self::Lint => "lint",
            Self::Build => "build",
        }
    }
}

impl fmt::Display for ToolchainCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-project command overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectCommands {
    /// Overrides the setup command.
    pub setup: Option<String>,
    /// Overrides the test command.
    pub test: Option<String>,
    /// Overrides the lint command.
    pub lint: Option<String>,
    /// Overrides the build command.
    pub build: Option<String>,
}

impl ProjectCommands {
    const fn slot(&self, kind: ToolchainCommand) -> Option<&String> {
        match kind {
            ToolchainCommand::Setup => self.setup.as_ref(),
            ToolchainCommand::Test => self.test.as_ref(),
            ToolchainCommand::Lint => self.lint.as_ref(),
            ToolchainCommand::Build => self.build.as_ref(),
        }
    }

    const fn slot_mut(&mut self, kind: ToolchainCommand) -> &mut Option<String> {
        match kind {
            ToolchainCommand::Setup => &mut self.setup,
            ToolchainCommand::Test => &mut self.test,
            ToolchainCommand::Lint => &mut self.lint,
            ToolchainCommand::Build => &mut self.build,
        }
    }
}

/// A source tree workflows can run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    id: ProjectId,
    name: String,
    description: String,
    path: Utf8PathBuf,
    project_type: ProjectType,
    commands: ProjectCommands,
}

impl Project {
    /// Creates a project rooted at `path`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        path: impl Into<Utf8PathBuf>,
        project_type: ProjectType,
    ) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            description: String::new(),
            path: path.into(),
            project_type,
            commands: ProjectCommands::default(),
        }
    }

    /// Replaces the generated identifier.
    #[must_use]
    pub const fn with_id(mut self, id: ProjectId) -> Self {
        self.id = id;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Overrides one toolchain command.
    #[must_use]
    pub fn with_command(mut self, kind: ToolchainCommand, command: impl Into<String>) -> Self {
        *self.commands.slot_mut(kind) = Some(command.into());
        self
    }

    /// Returns the project identifier.
    #[must_use]
    pub const fn id(&self) -> ProjectId {
        self.id
    }

    /// Returns the project name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the project root.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the toolchain type.
    #[must_use]
    pub const fn project_type(&self) -> ProjectType {
        self.project_type
    }

    /// Returns the configured overrides.
    #[must_use]
    pub const fn commands(&self) -> &ProjectCommands {
        &self.commands
    }

    /// Returns the shell command for a toolchain operation. An override
    /// wins over the project type's built-in command.
    #[must_use]
    pub fn command(&self, kind: ToolchainCommand) -> &str {
        self.commands
            .slot(kind)
            .map_or_else(|| self.project_type.default_command(kind), String::as_str)
    }
}

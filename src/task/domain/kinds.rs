//! Enumerations describing task classification and lifecycle.

use super::ParseTaskFieldError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Architecture and work planning.
    Planning,
    /// Codebase or requirement analysis.
    Analysis,
    /// Writing new code.
    CodeGeneration,
    /// Modifying existing code.
    CodeEdit,
    /// Restructuring code without behaviour change.
    Refactoring,
    /// Running or writing tests.
    Testing,
    /// Diagnosing a defect.
    Debugging,
    /// Reviewing changes.
    Review,
    /// Writing documentation.
    Documentation,
    /// Open-ended investigation.
    Research,
}

impl TaskType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Analysis => "analysis",
            Self::CodeGeneration => "code_generation",
            Self::CodeEdit => "code_edit",
            Self::Refactoring => "refactoring",
            Self::Testing => "testing",
            Self::Debugging => "debugging",
            Self::Review => "review",
            Self::Documentation => "documentation",
            Self::Research => "research",
        }
    }
}

impl TryFrom<&str> for TaskType {
    type Error = ParseTaskFieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "planning" => Ok(Self::Planning),
            "analysis" => Ok(Self::Analysis),
            "code_generation" => Ok(Self::CodeGeneration),
            "code_edit" => Ok(Self::CodeEdit),
            "refactoring" => Ok(Self::Refactoring),
            "testing" => Ok(Self::Testing),
            "debugging" => Ok(Self::Debugging),
            "review" => Ok(Self::Review),
            "documentation" => Ok(Self::Documentation),
            "research" => Ok(Self::Research),
            _ => Err(ParseTaskFieldError::new("type", value)),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created and waiting on dependencies or scheduling.
    Pending,
    /// Dependencies satisfied; eligible for claiming.
    Ready,
    /// Reserved for a worker but not yet started.
    Assigned,
    /// Being executed by its assigned worker.
    InProgress,
    /// Held back by a runtime block.
    Blocked,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
    /// Withdrawn before completion.
    Cancelled,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for states no transition leaves.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskFieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "assigned" => Ok(Self::Assigned),
            // Older rows used `running` for claimed tasks.
            "in_progress" | "running" => Ok(Self::InProgress),
            "blocked" => Ok(Self::Blocked),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseTaskFieldError::new("status", value)),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling priority. Ordering follows urgency.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// Ahead of normal work.
    High,
    /// Ahead of everything else.
    Critical,
}

impl TaskPriority {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Returns the integer band stored in the `priority` column.
    #[must_use]
    pub const fn band(self) -> i32 {
        match self {
            Self::Low => 1,
            Self::Normal => 5,
            Self::High => 10,
            Self::Critical => 20,
        }
    }

    /// Maps a stored integer band back to a priority.
    ///
    /// Non-positive values are treated as unset and decode to
    /// [`TaskPriority::Normal`]; this never fails.
    #[must_use]
    pub const fn from_band(value: i32) -> Self {
        match value {
            i32::MIN..=0 => Self::Normal,
            1 => Self::Low,
            2..=9 => Self::Normal,
            10..=19 => Self::High,
            _ => Self::Critical,
        }
    }

    /// Parses caller input where an empty string selects the default.
    ///
    /// # Errors
    ///
    /// Returns [`ParseTaskFieldError`] for non-empty unknown values.
    pub fn parse_or_default(value: &str) -> Result<Self, ParseTaskFieldError> {
        if value.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::try_from(value)
    }
}

impl TryFrom<&str> for TaskPriority {
    type Error = ParseTaskFieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "low" => Ok(Self::Low),
            "normal" | "medium" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(ParseTaskFieldError::new("priority", value)),
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business impact of a task failing, independent of its priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Failure is tolerable.
    Low,
    /// Default impact.
    #[default]
    Normal,
    /// Failure needs attention.
    High,
    /// Failure blocks dependent work.
    Critical,
}

impl Criticality {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl TryFrom<&str> for Criticality {
    type Error = ParseTaskFieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(ParseTaskFieldError::new("criticality", value)),
        }
    }
}

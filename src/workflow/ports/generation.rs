//! Port for the language-model provider behind analysis and generation
//! steps.

use crate::workflow::domain::StepAction;
use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type for generation provider operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Prompt sent to a generation provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Step action that produced the request.
    pub action: StepAction,
    /// Step description used as the prompt.
    pub prompt: String,
    /// Name of the target project.
    pub project_name: String,
    /// Root of the target project.
    pub project_path: Utf8PathBuf,
}

/// Provider reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResponse {
    /// Generated text stored as the step output.
    pub content: String,
}

/// Language-model provider contract.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Produces a completion for `request`.
    async fn generate(&self, request: GenerationRequest) -> GenerationResult<GenerationResponse>;
}

/// Errors returned by generation providers.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The provider refused the request.
    #[error("generation provider rejected request: {0}")]
    Rejected(String),

    /// Transport or provider failure.
    #[error("generation provider error: {0}")]
    Provider(Arc<dyn std::error::Error + Send + Sync>),
}

impl GenerationError {
    /// Wraps a provider error.
    pub fn provider(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Provider(Arc::new(err))
    }
}

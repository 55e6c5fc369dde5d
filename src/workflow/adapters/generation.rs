//! Handler for analysis and generation steps.

use crate::workflow::{
    domain::{Step, StepAction},
    ports::{
        GenerationProvider, GenerationRequest, StepContext, StepHandler, StepHandlerError,
        StepHandlerResult,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// Sends analysis and generation steps to a [`GenerationProvider`].
///
/// Without a provider the handler answers with a fixed summary of the step
/// description.
#[derive(Clone, Default)]
pub struct GenerationHandler {
    provider: Option<Arc<dyn GenerationProvider>>,
}

impl GenerationHandler {
    /// Creates a handler backed by `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Creates a handler that only produces placeholder summaries.
    #[must_use]
    pub const fn placeholder() -> Self {
        Self { provider: None }
    }

    fn placeholder_output(step: &Step) -> StepHandlerResult<String> {
        match step.action() {
            StepAction::AnalyzeCode => Ok(format!("Analysis completed for: {}", step.description())),
            StepAction::GenerateCode => Ok(format!(
                "Code generation completed for: {}",
                step.description()
            )),
            other => Err(StepHandlerError::NoHandler(other)),
        }
    }
}

impl std::fmt::Debug for GenerationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationHandler")
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

#[async_trait]
impl StepHandler for GenerationHandler {
    async fn handle(&self, step: &Step, context: &StepContext) -> StepHandlerResult<String> {
        let Some(provider) = &self.provider else {
            return Self::placeholder_output(step);
        };
        if !matches!(step.action(), StepAction::AnalyzeCode | StepAction::GenerateCode) {
            return Err(StepHandlerError::NoHandler(step.action()));
        }
        let project = context.project();
        let request = GenerationRequest {
            action: step.action(),
            prompt: step.description().to_owned(),
            project_name: project.name().to_owned(),
            project_path: project.path().to_owned(),
        };
        let response = tokio::select! {
            result = provider.generate(request) => result?,
            () = context.cancellation().cancelled() => return Err(StepHandlerError::Cancelled),
        };
        Ok(response.content)
    }
}

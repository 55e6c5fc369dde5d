//! Project catalog port.

use crate::workflow::domain::{Project, ProjectId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for project catalog operations.
pub type ProjectCatalogResult<T> = Result<T, ProjectCatalogError>;

/// Read access to known projects.
#[async_trait]
pub trait ProjectCatalog: Send + Sync {
    /// Finds a project by identifier.
    async fn find_project(&self, id: ProjectId) -> ProjectCatalogResult<Option<Project>>;
}

/// Errors returned by project catalog adapters.
#[derive(Debug, Clone, Error)]
pub enum ProjectCatalogError {
    /// Storage failure.
    #[error("project catalog error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ProjectCatalogError {
    /// Wraps a storage error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

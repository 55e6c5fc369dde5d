//! In-memory project catalog.

use crate::workflow::{
    domain::{Project, ProjectId, ProjectType},
    ports::{ProjectCatalog, ProjectCatalogError, ProjectCatalogResult},
};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory project catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProjectCatalog {
    projects: Arc<RwLock<HashMap<ProjectId, Project>>>,
}

impl InMemoryProjectCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a project.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectCatalogError::Persistence`] when the lock is
    /// poisoned.
    pub fn insert(&self, project: Project) -> ProjectCatalogResult<()> {
        let mut projects = self.projects.write().map_err(|err| {
            ProjectCatalogError::persistence(std::io::Error::other(err.to_string()))
        })?;
        projects.insert(project.id(), project);
        Ok(())
    }

    /// Registers the directory at `path`, detecting its toolchain from the
    /// manifest files it contains.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectCatalogError::Persistence`] when the directory
    /// cannot be opened or the lock is poisoned.
    pub fn register_directory(
        &self,
        name: impl Into<String>,
        path: impl Into<Utf8PathBuf>,
    ) -> ProjectCatalogResult<Project> {
        let root = path.into();
        let project_type = detect_project_type(&root)?;
        let project = Project::new(name, root, project_type);
        self.insert(project.clone())?;
        Ok(project)
    }
}

/// Detects a project's toolchain from the manifest files in `path`.
///
/// Falls back to [`ProjectType::Generic`] when no manifest is present.
///
/// # Errors
///
/// Returns [`ProjectCatalogError::Persistence`] when the directory cannot
/// be opened.
pub fn detect_project_type(path: &Utf8Path) -> ProjectCatalogResult<ProjectType> {
    let dir =
        Dir::open_ambient_dir(path, ambient_authority()).map_err(ProjectCatalogError::persistence)?;
    let detected = [
        ProjectType::Go,
        ProjectType::Node,
        ProjectType::Python,
        ProjectType::Rust,
    ]
    .into_iter()
    .find(|candidate| candidate.marker_file().is_some_and(|marker| dir.exists(marker)));
    Ok(detected.unwrap_or_default())
}

#[async_trait]
impl ProjectCatalog for InMemoryProjectCatalog {
    async fn find_project(&self, id: ProjectId) -> ProjectCatalogResult<Option<Project>> {
        let projects = self.projects.read().map_err(|err| {
            ProjectCatalogError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(projects.get(&id).cloned())
    }
}

//! Contract between the persistence store and the managers it snapshots.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Subsystem whose state is written under its own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subsystem {
    /// Development sessions.
    Sessions,
    /// Conversation memory.
    Conversations,
    /// Focus chains.
    Focus,
}

impl Subsystem {
    /// Every subsystem in directory walk order.
    pub const ALL: [Self; 3] = [Self::Sessions, Self::Conversations, Self::Focus];

    /// Returns the directory name used under the store base path.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sessions => "sessions",
            Self::Conversations => "conversations",
            Self::Focus => "focus",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by snapshot sources.
#[derive(Debug, Clone, Error)]
pub enum SnapshotSourceError {
    /// The requested entity is not held by the source.
    #[error("snapshot entity not found: {0}")]
    NotFound(String),

    /// A snapshot document did not describe a valid entity.
    #[error("invalid snapshot document: {0}")]
    Invalid(Arc<serde_json::Error>),

    /// The source's own storage failed.
    #[error("snapshot source error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl SnapshotSourceError {
    /// Wraps a storage error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<serde_json::Error> for SnapshotSourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Invalid(Arc::new(err))
    }
}

/// Result type for snapshot source operations.
pub type SnapshotSourceResult<T> = Result<T, SnapshotSourceError>;

/// A manager whose entities can be exported to and imported from snapshot
/// documents.
///
/// Calls are made from a blocking thread while the store holds its walk
/// lock, so implementations must not block on the store.
pub trait SnapshotSource: Send + Sync {
    /// Lists the identifiers of every entity to export.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotSourceError`] when the listing fails.
    fn snapshot_ids(&self) -> SnapshotSourceResult<Vec<String>>;

    /// Exports one entity as a snapshot document.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotSourceError::NotFound`] for unknown identifiers.
    fn export(&self, id: &str) -> SnapshotSourceResult<Value>;

    /// Imports a snapshot document, replacing any entity with the same
    /// identifier. Returns the imported identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotSourceError::Invalid`] when the document does not
    /// describe an entity.
    fn import(&self, snapshot: Value) -> SnapshotSourceResult<String>;
}

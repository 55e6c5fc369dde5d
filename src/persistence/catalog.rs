//! Thread-safe in-memory managers for snapshot entities.

use super::entities::{Conversation, FocusChain, Session, SnapshotEntity};
use super::source::{SnapshotSource, SnapshotSourceError, SnapshotSourceResult};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Snapshot document wrapping one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotDocument<E> {
    item: E,
    exported_at: DateTime<Utc>,
}

/// Holds entities keyed by identifier and exposes them to the persistence
/// store.
#[derive(Debug)]
pub struct SnapshotCatalog<E, C> {
    items: Arc<RwLock<HashMap<String, E>>>,
    clock: Arc<C>,
}

impl<E, C> Clone for SnapshotCatalog<E, C> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            clock: Arc::clone(&self.clock),
        }
    }
}

/// Session manager.
pub type SessionCatalog<C> = SnapshotCatalog<Session, C>;

/// Conversation memory manager.
pub type ConversationCatalog<C> = SnapshotCatalog<Conversation, C>;

/// Focus chain manager.
pub type FocusCatalog<C> = SnapshotCatalog<FocusChain, C>;

impl<E, C> SnapshotCatalog<E, C>
where
    E: SnapshotEntity,
    C: Clock + Send + Sync,
{
    /// Creates an empty catalog stamping exports with `clock`.
    #[must_use]
    pub fn new(clock: Arc<C>) -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Stores an entity, returning the one it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotSourceError::Persistence`] when the lock is
    /// poisoned.
    pub fn insert(&self, entity: E) -> SnapshotSourceResult<Option<E>> {
        let mut items = self.items.write().map_err(|err| poisoned(&err))?;
        Ok(items.insert(entity.snapshot_id().to_owned(), entity))
    }

    /// Returns a copy of an entity.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotSourceError::Persistence`] when the lock is
    /// poisoned.
    pub fn get(&self, id: &str) -> SnapshotSourceResult<Option<E>> {
        let items = self.items.read().map_err(|err| poisoned(&err))?;
        Ok(items.get(id).cloned())
    }

    /// Removes an entity.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotSourceError::Persistence`] when the lock is
    /// poisoned.
    pub fn remove(&self, id: &str) -> SnapshotSourceResult<Option<E>> {
        let mut items = self.items.write().map_err(|err| poisoned(&err))?;
        Ok(items.remove(id))
    }

    /// Returns every entity ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotSourceError::Persistence`] when the lock is
    /// poisoned.
    pub fn list(&self) -> SnapshotSourceResult<Vec<E>> {
        let items = self.items.read().map_err(|err| poisoned(&err))?;
        let mut entities: Vec<E> = items.values().cloned().collect();
        entities.sort_by(|left, right| left.snapshot_id().cmp(right.snapshot_id()));
        Ok(entities)
    }

    /// Returns the number of entities held.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotSourceError::Persistence`] when the lock is
    /// poisoned.
    pub fn len(&self) -> SnapshotSourceResult<usize> {
        Ok(self.items.read().map_err(|err| poisoned(&err))?.len())
    }

    /// Returns `true` when the catalog holds nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotSourceError::Persistence`] when the lock is
    /// poisoned.
    pub fn is_empty(&self) -> SnapshotSourceResult<bool> {
        Ok(self.items.read().map_err(|err| poisoned(&err))?.is_empty())
    }
}

impl<E, C> SnapshotSource for SnapshotCatalog<E, C>
where
    E: SnapshotEntity,
    C: Clock + Send + Sync,
{
    fn snapshot_ids(&self) -> SnapshotSourceResult<Vec<String>> {
        let items = self.items.read().map_err(|err| poisoned(&err))?;
        let mut ids: Vec<String> = items.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn export(&self, id: &str) -> SnapshotSourceResult<Value> {
        let item = self
            .get(id)?
            .ok_or_else(|| SnapshotSourceError::NotFound(id.to_owned()))?;
        let document = SnapshotDocument {
            item,
            exported_at: self.clock.utc(),
        };
        Ok(serde_json::to_value(document)?)
    }

    fn import(&self, snapshot: Value) -> SnapshotSourceResult<String> {
        let document: SnapshotDocument<E> = serde_json::from_value(snapshot)?;
        let id = document.item.snapshot_id().to_owned();
        self.insert(document.item)?;
        Ok(id)
    }
}

fn poisoned<T>(err: &std::sync::PoisonError<T>) -> SnapshotSourceError {
    SnapshotSourceError::persistence(std::io::Error::other(err.to_string()))
}

//! Snapshot store writing every registered subsystem to disk.

use super::fs::{
    SNAPSHOT_EXTENSIONS, TEMP_SUFFIX, copy_dir, create_ambient, io_error, is_not_found,
    open_ambient, open_ambient_if_exists, open_child_if_exists, remove_child, snapshot_files,
    validate_snapshot_id,
};
use super::serializer::{
    JsonSerializer, SerializerError, Serializer, SnapshotFormat, detect_format, serializer_for,
};
use super::source::{SnapshotSource, SnapshotSourceError, Subsystem};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Summary of one full save or load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMetadata {
    path: Utf8PathBuf,
    format: SnapshotFormat,
    size: u64,
    timestamp: DateTime<Utc>,
    items: usize,
}

impl SnapshotMetadata {
    /// Returns the store base path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the configured serializer format.
    #[must_use]
    pub const fn format(&self) -> SnapshotFormat {
        self.format
    }

    /// Returns the number of bytes written or read.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns when the walk finished.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the number of entities written or imported.
    #[must_use]
    pub const fn items(&self) -> usize {
        self.items
    }
}

/// Errors raised by the persistence store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A snapshot identifier is not a safe file stem.
    #[error("invalid snapshot id: {0:?}")]
    InvalidSnapshotId(String),

    /// Auto-save was requested with a zero interval.
    #[error("auto-save interval must be greater than zero")]
    InvalidInterval,

    /// A filesystem call failed.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// Operation attempted.
        operation: &'static str,
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A snapshot document could not be encoded.
    #[error("cannot encode {subsystem} snapshot {id}: {source}")]
    Encode {
        /// Owning subsystem.
        subsystem: Subsystem,
        /// Entity identifier.
        id: String,
        /// Underlying error.
        #[source]
        source: SerializerError,
    },

    /// A snapshot file could not be decoded.
    #[error("cannot decode {path}: {source}")]
    Decode {
        /// Offending file.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: SerializerError,
    },

    /// A registered manager failed to export or import.
    #[error("{subsystem} snapshot {id} rejected: {source}")]
    Source {
        /// Owning subsystem.
        subsystem: Subsystem,
        /// Entity identifier or file name.
        id: String,
        /// Underlying error.
        #[source]
        source: SnapshotSourceError,
    },

    /// The blocking walk panicked or was cancelled.
    #[error("snapshot walk did not finish: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Internal store state is unusable.
    #[error("persistence store state error: {0}")]
    State(Arc<dyn std::error::Error + Send + Sync>),
}

impl PersistenceError {
    /// Wraps a state error.
    pub fn state(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::State(Arc::new(err))
    }

    /// Returns `true` for caller mistakes rather than runtime failures.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidSnapshotId(_) | Self::InvalidInterval)
    }
}

/// Result type for persistence store operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Callback invoked with the summary of a finished save or load.
pub type SnapshotCallback = Arc<dyn Fn(&SnapshotMetadata) + Send + Sync>;

/// Callback invoked for each skipped item or failed walk.
pub type ErrorCallback = Arc<dyn Fn(&PersistenceError) + Send + Sync>;

#[derive(Default, Clone)]
struct Callbacks {
    save: Vec<SnapshotCallback>,
    load: Vec<SnapshotCallback>,
    error: Vec<ErrorCallback>,
}

struct WalkOutcome {
    metadata: SnapshotMetadata,
    skipped: Vec<PersistenceError>,
}

#[derive(Clone, Copy)]
enum Walk {
    Save,
    Load,
}

struct StoreInner<C> {
    base: Utf8PathBuf,
    clock: Arc<C>,
    walk: Mutex<()>,
    sources: RwLock<BTreeMap<Subsystem, Arc<dyn SnapshotSource>>>,
    serializer: RwLock<Arc<dyn Serializer>>,
    last_save: RwLock<Option<DateTime<Utc>>>,
    callbacks: RwLock<Callbacks>,
    auto_save: Mutex<Option<CancellationToken>>,
}

/// Writes and reads snapshots of every registered subsystem under
/// `<base>/<subsystem>/<id><ext>`.
///
/// Clones share state. Save, load, clear, backup and restore serialise on
/// one walk lock and run on the blocking pool.
pub struct PersistenceStore<C> {
    inner: Arc<StoreInner<C>>,
}

impl<C> Clone for PersistenceStore<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for PersistenceStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceStore")
            .field("base", &self.inner.base)
            .finish_non_exhaustive()
    }
}

fn state_error<T>(err: &PoisonError<T>) -> PersistenceError {
    PersistenceError::state(std::io::Error::other(err.to_string()))
}

impl<C> PersistenceStore<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates a store rooted at `base` writing pretty JSON.
    ///
    /// Nothing touches the disk until the first save.
    pub fn new(base: impl Into<Utf8PathBuf>, clock: Arc<C>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                base: base.into(),
                clock,
                walk: Mutex::new(()),
                sources: RwLock::new(BTreeMap::new()),
                serializer: RwLock::new(Arc::new(JsonSerializer)),
                last_save: RwLock::new(None),
                callbacks: RwLock::new(Callbacks::default()),
                auto_save: Mutex::new(None),
            }),
        }
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_path(&self) -> &Utf8Path {
        &self.inner.base
    }

    /// Registers the manager for a subsystem, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::State`] when the registry lock is
    /// poisoned.
    pub fn register(
        &self,
        subsystem: Subsystem,
        source: Arc<dyn SnapshotSource>,
    ) -> PersistenceResult<()> {
        let mut sources = self.inner.sources.write().map_err(|err| state_error(&err))?;
        sources.insert(subsystem, source);
        Ok(())
    }

    /// Removes the manager for a subsystem. Returns `false` when none was
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::State`] when the registry lock is
    /// poisoned.
    pub fn unregister(&self, subsystem: Subsystem) -> PersistenceResult<bool> {
        let mut sources = self.inner.sources.write().map_err(|err| state_error(&err))?;
        Ok(sources.remove(&subsystem).is_some())
    }

    /// Replaces the serializer used by later saves. Loads detect the format
    /// of each file regardless.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::State`] when the lock is poisoned.
    pub fn set_serializer(&self, serializer: Arc<dyn Serializer>) -> PersistenceResult<()> {
        let mut current = self
            .inner
            .serializer
            .write()
            .map_err(|err| state_error(&err))?;
        *current = serializer;
        Ok(())
    }

    /// Returns when the last successful save finished.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::State`] when the lock is poisoned.
    pub fn last_save_time(&self) -> PersistenceResult<Option<DateTime<Utc>>> {
        let last_save = self.inner.last_save.read().map_err(|err| state_error(&err))?;
        Ok(*last_save)
    }

    /// Registers a callback run after each successful save.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::State`] when the lock is poisoned.
    pub fn on_save<F>(&self, callback: F) -> PersistenceResult<()>
    where
        F: Fn(&SnapshotMetadata) + Send + Sync + 'static,
    {
        let mut callbacks = self.inner.callbacks.write().map_err(|err| state_error(&err))?;
        callbacks.save.push(Arc::new(callback));
        Ok(())
    }

    /// Registers a callback run after each successful load.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::State`] when the lock is poisoned.
    pub fn on_load<F>(&self, callback: F) -> PersistenceResult<()>
    where
        F: Fn(&SnapshotMetadata) + Send + Sync + 'static,
    {
        let mut callbacks = self.inner.callbacks.write().map_err(|err| state_error(&err))?;
        callbacks.load.push(Arc::new(callback));
        Ok(())
    }

    /// Registers a callback run for every skipped item and failed walk.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::State`] when the lock is poisoned.
    pub fn on_error<F>(&self, callback: F) -> PersistenceResult<()>
    where
        F: Fn(&PersistenceError) + Send + Sync + 'static,
    {
        let mut callbacks = self.inner.callbacks.write().map_err(|err| state_error(&err))?;
        callbacks.error.push(Arc::new(callback));
        Ok(())
    }

    /// Exports every entity of every registered subsystem.
    ///
    /// Entities that fail to export, encode or write are logged, reported
    /// to the error callbacks and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] when a subsystem directory cannot
    /// be created.
    pub async fn save_all(&self) -> PersistenceResult<SnapshotMetadata> {
        let inner = Arc::clone(&self.inner);
        let outcome = tokio::task::spawn_blocking(move || inner.save_walk()).await;
        self.finish(Walk::Save, outcome)
    }

    /// Imports every snapshot file of every registered subsystem.
    ///
    /// Files that fail to read, decode or import are logged, reported to
    /// the error callbacks and skipped. Missing directories contribute no
    /// items.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] when an existing directory cannot
    /// be read.
    pub async fn load_all(&self) -> PersistenceResult<SnapshotMetadata> {
        let inner = Arc::clone(&self.inner);
        let outcome = tokio::task::spawn_blocking(move || inner.load_walk()).await;
        self.finish(Walk::Load, outcome)
    }

    /// Alias for [`PersistenceStore::save_all`].
    ///
    /// # Errors
    ///
    /// See [`PersistenceStore::save_all`].
    pub async fn save(&self) -> PersistenceResult<SnapshotMetadata> {
        self.save_all().await
    }

    /// Alias for [`PersistenceStore::load_all`].
    ///
    /// # Errors
    ///
    /// See [`PersistenceStore::load_all`].
    pub async fn load(&self) -> PersistenceResult<SnapshotMetadata> {
        self.load_all().await
    }

    /// Removes every subsystem directory.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] when a directory cannot be removed.
    pub async fn clear(&self) -> PersistenceResult<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.clear_walk()).await?
    }

    /// Copies every subsystem directory into `destination`, replacing
    /// what is there. Files are copied as stored.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] when a copy fails.
    pub async fn backup(&self, destination: impl Into<Utf8PathBuf>) -> PersistenceResult<()> {
        let inner = Arc::clone(&self.inner);
        let target = destination.into();
        tokio::task::spawn_blocking(move || inner.backup_walk(&target)).await?
    }

    /// Replaces every subsystem directory with its copy under `source`.
    ///
    /// A subsystem missing from the backup ends up empty.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] when `source` does not exist or a
    /// copy fails.
    pub async fn restore(&self, source: impl Into<Utf8PathBuf>) -> PersistenceResult<()> {
        let inner = Arc::clone(&self.inner);
        let origin = source.into();
        tokio::task::spawn_blocking(move || inner.restore_walk(&origin)).await?
    }

    /// Starts saving every `interval` on a background task. Returns `false`
    /// without starting a second loop when auto-save is already running.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidInterval`] for a zero interval.
    pub fn enable_auto_save(&self, interval: Duration) -> PersistenceResult<bool> {
        if interval.is_zero() {
            return Err(PersistenceError::InvalidInterval);
        }
        let mut running = self
            .inner
            .auto_save
            .lock()
            .map_err(|err| state_error(&err))?;
        if running.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return Ok(false);
        }
        let token = CancellationToken::new();
        tokio::spawn(self.clone().auto_save_loop(interval, token.clone()));
        *running = Some(token);
        tracing::info!(interval_secs = interval.as_secs(), "auto-save enabled");
        Ok(true)
    }

    /// Stops the auto-save loop. Returns `false` when it was not running.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::State`] when the lock is poisoned.
    pub fn disable_auto_save(&self) -> PersistenceResult<bool> {
        let mut running = self
            .inner
            .auto_save
            .lock()
            .map_err(|err| state_error(&err))?;
        let Some(token) = running.take() else {
            return Ok(false);
        };
        token.cancel();
        tracing::info!("auto-save disabled");
        Ok(true)
    }

    /// Returns `true` while the auto-save loop is running.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::State`] when the lock is poisoned.
    pub fn is_auto_saving(&self) -> PersistenceResult<bool> {
        let running = self
            .inner
            .auto_save
            .lock()
            .map_err(|err| state_error(&err))?;
        Ok(running.as_ref().is_some_and(|token| !token.is_cancelled()))
    }

    async fn auto_save_loop(self, interval: Duration, token: CancellationToken) {
        let mut ticker = time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.save_all().await {
                        tracing::warn!(error = %err, "auto-save failed");
                    }
                }
            }
        }
    }

    fn finish(
        &self,
        walk: Walk,
        outcome: Result<PersistenceResult<WalkOutcome>, tokio::task::JoinError>,
    ) -> PersistenceResult<SnapshotMetadata> {
        let callbacks = self
            .inner
            .callbacks
            .read()
            .map_err(|err| state_error(&err))?
            .clone();
        let result = outcome.map_err(PersistenceError::from).and_then(|walked| walked);
        match result {
            Ok(WalkOutcome { metadata, skipped }) => {
                for err in &skipped {
                    for callback in &callbacks.error {
                        callback(err);
                    }
                }
                let listeners = match walk {
                    Walk::Save => &callbacks.save,
                    Walk::Load => &callbacks.load,
                };
                for callback in listeners {
                    callback(&metadata);
                }
                Ok(metadata)
            }
            Err(err) => {
                for callback in &callbacks.error {
                    callback(&err);
                }
                Err(err)
            }
        }
    }
}

impl<C> StoreInner<C>
where
    C: Clock + Send + Sync,
{
    fn registered(&self) -> PersistenceResult<Vec<(Subsystem, Arc<dyn SnapshotSource>)>> {
        let sources = self.sources.read().map_err(|err| state_error(&err))?;
        Ok(sources
            .iter()
            .map(|(subsystem, source)| (*subsystem, Arc::clone(source)))
            .collect())
    }

    fn current_serializer(&self) -> PersistenceResult<Arc<dyn Serializer>> {
        let serializer = self.serializer.read().map_err(|err| state_error(&err))?;
        Ok(Arc::clone(&serializer))
    }

    fn metadata(&self, format: SnapshotFormat, size: u64, items: usize) -> SnapshotMetadata {
        SnapshotMetadata {
            path: self.base.clone(),
            format,
            size,
            timestamp: self.clock.utc(),
            items,
        }
    }

    fn save_walk(&self) -> PersistenceResult<WalkOutcome> {
        let _walk = self.walk.lock().map_err(|err| state_error(&err))?;
        let sources = self.registered()?;
        let serializer = self.current_serializer()?;
        let base = create_ambient(&self.base)?;

        let mut skipped = Vec::new();
        let mut items = 0_usize;
        let mut size = 0_u64;
        for (subsystem, source) in sources {
            let root = self.base.join(subsystem.as_str());
            base.create_dir_all(subsystem.as_str())
                .map_err(io_error("create", &root))?;
            let dir = base
                .open_dir(subsystem.as_str())
                .map_err(io_error("open", &root))?;
            let ids = match source.snapshot_ids() {
                Ok(listed) => listed,
                Err(err) => {
                    let failure = PersistenceError::Source {
                        subsystem,
                        id: String::from("*"),
                        source: err,
                    };
                    tracing::warn!(%subsystem, error = %failure, "subsystem skipped during save");
                    skipped.push(failure);
                    continue;
                }
            };
            for id in ids {
                let written = write_entity(
                    &dir,
                    &root,
                    subsystem,
                    source.as_ref(),
                    serializer.as_ref(),
                    &id,
                );
                match written {
                    Ok(bytes) => {
                        items += 1;
                        size = size.saturating_add(bytes);
                    }
                    Err(err) => {
                        tracing::warn!(
                            %subsystem,
                            snapshot_id = %id,
                            error = %err,
                            "snapshot skipped during save"
                        );
                        skipped.push(err);
                    }
                }
            }
        }

        let metadata = self.metadata(serializer.format(), size, items);
        let mut last_save = self.last_save.write().map_err(|err| state_error(&err))?;
        *last_save = Some(metadata.timestamp());
        tracing::debug!(items, size, path = %self.base, "snapshot saved");
        Ok(WalkOutcome { metadata, skipped })
    }

    fn load_walk(&self) -> PersistenceResult<WalkOutcome> {
        let _walk = self.walk.lock().map_err(|err| state_error(&err))?;
        let sources = self.registered()?;
        let format = self.current_serializer()?.format();

        let mut skipped = Vec::new();
        let mut items = 0_usize;
        let mut size = 0_u64;
        if let Some(base) = open_ambient_if_exists(&self.base)? {
            for (subsystem, source) in sources {
                let root = self.base.join(subsystem.as_str());
                let Some(dir) = open_child_if_exists(&base, subsystem.as_str(), &root)? else {
                    continue;
                };
                for name in snapshot_files(&dir, &root)? {
                    match read_entity(&dir, &root, subsystem, source.as_ref(), &name) {
                        Ok(bytes) => {
                            items += 1;
                            size = size.saturating_add(bytes);
                        }
                        Err(err) => {
                            tracing::warn!(
                                %subsystem,
                                file = %name,
                                error = %err,
                                "snapshot skipped during load"
                            );
                            skipped.push(err);
                        }
                    }
                }
            }
        }

        tracing::debug!(items, size, path = %self.base, "snapshot loaded");
        Ok(WalkOutcome {
            metadata: self.metadata(format, size, items),
            skipped,
        })
    }

    fn clear_walk(&self) -> PersistenceResult<()> {
        let _walk = self.walk.lock().map_err(|err| state_error(&err))?;
        let Some(base) = open_ambient_if_exists(&self.base)? else {
            return Ok(());
        };
        for subsystem in Subsystem::ALL {
            remove_child(&base, subsystem.as_str(), &self.base.join(subsystem.as_str()))?;
        }
        Ok(())
    }

    fn backup_walk(&self, destination: &Utf8Path) -> PersistenceResult<()> {
        let _walk = self.walk.lock().map_err(|err| state_error(&err))?;
        let target = create_ambient(destination)?;
        let origin = open_ambient_if_exists(&self.base)?;
        for subsystem in Subsystem::ALL {
            let name = subsystem.as_str();
            remove_child(&target, name, &destination.join(name))?;
            if let Some(base) = origin.as_ref() {
                replace_child(
                    base,
                    &self.base.join(name),
                    &target,
                    &destination.join(name),
                    name,
                )?;
            }
        }
        tracing::info!(destination = %destination, "snapshot backup written");
        Ok(())
    }

    fn restore_walk(&self, origin: &Utf8Path) -> PersistenceResult<()> {
        let _walk = self.walk.lock().map_err(|err| state_error(&err))?;
        let backup = open_ambient(origin)?;
        let base = create_ambient(&self.base)?;
        for subsystem in Subsystem::ALL {
            let name = subsystem.as_str();
            remove_child(&base, name, &self.base.join(name))?;
            replace_child(
                &backup,
                &origin.join(name),
                &base,
                &self.base.join(name),
                name,
            )?;
        }
        tracing::info!(origin = %origin, "snapshot backup restored");
        Ok(())
    }
}

/// Copies `name` from `from` into `to` when it exists in `from`.
fn replace_child(
    from: &Dir,
    from_path: &Utf8Path,
    to: &Dir,
    to_path: &Utf8Path,
    name: &str,
) -> PersistenceResult<()> {
    let Some(source) = open_child_if_exists(from, name, from_path)? else {
        return Ok(());
    };
    to.create_dir(name).map_err(io_error("create", to_path))?;
    let target = to.open_dir(name).map_err(io_error("open", to_path))?;
    copy_dir(&source, &target, from_path)
}

fn write_entity(
    dir: &Dir,
    root: &Utf8Path,
    subsystem: Subsystem,
    source: &dyn SnapshotSource,
    serializer: &dyn Serializer,
    id: &str,
) -> PersistenceResult<u64> {
    validate_snapshot_id(id)?;
    let snapshot = source.export(id).map_err(|err| PersistenceError::Source {
        subsystem,
        id: id.to_owned(),
        source: err,
    })?;
    let bytes = serializer
        .serialize(&snapshot)
        .map_err(|err| PersistenceError::Encode {
            subsystem,
            id: id.to_owned(),
            source: err,
        })?;

    let file_name = format!("{id}{}", serializer.extension());
    let temp_name = format!("{file_name}{TEMP_SUFFIX}");
    dir.write(&temp_name, &bytes)
        .map_err(io_error("write", &root.join(&temp_name)))?;
    if let Err(err) = dir.rename(&temp_name, dir, &file_name) {
        if let Err(cleanup) = dir.remove_file(&temp_name) {
            tracing::debug!(file = %temp_name, error = %cleanup, "temporary snapshot left behind");
        }
        return Err(io_error("rename", &root.join(&file_name))(err));
    }

    for extension in SNAPSHOT_EXTENSIONS {
        if extension == serializer.extension() {
            continue;
        }
        let stale = format!("{id}{extension}");
        match dir.remove_file(&stale) {
            Ok(()) => tracing::debug!(file = %stale, "stale snapshot variant removed"),
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(io_error("remove", &root.join(&stale))(err)),
        }
    }

    Ok(u64::try_from(bytes.len()).unwrap_or(u64::MAX))
}

fn read_entity(
    dir: &Dir,
    root: &Utf8Path,
    subsystem: Subsystem,
    source: &dyn SnapshotSource,
    name: &str,
) -> PersistenceResult<u64> {
    let path = root.join(name);
    let bytes = dir.read(name).map_err(io_error("read", &path))?;
    let snapshot = detect_format(&bytes)
        .and_then(|format| serializer_for(format).deserialize(&bytes))
        .map_err(|err| PersistenceError::Decode { path, source: err })?;
    source
        .import(snapshot)
        .map_err(|err| PersistenceError::Source {
            subsystem,
            id: name.to_owned(),
            source: err,
        })?;
    Ok(u64::try_from(bytes.len()).unwrap_or(u64::MAX))
}

//! Orchestrator configuration.
//!
//! Configuration is read from a JSON file. Every field has a default, so an
//! empty object is a valid file. `HELIX_LOG` and `HELIX_DATA_DIR` override
//! the logging filter and the snapshot directory after the file is read.

use crate::persistence::{
    PersistenceError, PersistenceStore, SerializerError, SnapshotFormat, serializer_for,
};
use crate::task::{ports::TaskBackend, services::TaskStore};
use camino::{Utf8Path, Utf8PathBuf};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding [`LoggingConfig::filter`].
pub const LOG_ENV: &str = "HELIX_LOG";

/// Environment variable overriding [`PersistenceConfig::base_path`].
pub const DATA_DIR_ENV: &str = "HELIX_DATA_DIR";

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A snapshot format name is not supported.
    #[error(transparent)]
    Format(#[from] SerializerError),

    /// The auto-save interval is zero while auto-save is enabled.
    #[error("persistence.auto_save_interval_secs must be greater than zero")]
    ZeroInterval,

    /// The configured store could not be prepared.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Snapshot store settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Task store settings.
    #[serde(default)]
    pub tasks: TaskConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Snapshot store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Directory holding the subsystem snapshot directories.
    #[serde(default = "default_base_path")]
    pub base_path: Utf8PathBuf,

    /// Snapshot encoding: `json`, `compact_json` or `gzip_json`.
    #[serde(default = "default_format")]
    pub format: String,

    /// Seconds between automatic saves.
    #[serde(default = "default_auto_save_interval")]
    pub auto_save_interval_secs: u64,

    /// Whether automatic saving starts with the store.
    #[serde(default = "default_true")]
    pub auto_save: bool,
}

fn default_base_path() -> Utf8PathBuf {
    Utf8PathBuf::from("helix-data")
}

fn default_format() -> String {
    SnapshotFormat::Json.as_str().to_owned()
}

const fn default_auto_save_interval() -> u64 {
    300
}

const fn default_true() -> bool {
    true
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            format: default_format(),
            auto_save_interval_secs: default_auto_save_interval(),
            auto_save: default_true(),
        }
    }
}

impl PersistenceConfig {
    /// Parses the configured snapshot format.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Format`] for unknown names.
    pub fn snapshot_format(&self) -> ConfigResult<SnapshotFormat> {
        Ok(SnapshotFormat::try_from(self.format.as_str())?)
    }

    /// Returns the auto-save period.
    #[must_use]
    pub const fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.auto_save_interval_secs)
    }

    /// Builds a store with the configured serializer, starting auto-save
    /// when enabled.
    ///
    /// Must be called from within a Tokio runtime when auto-save is on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown format or a store that cannot
    /// be configured.
    pub fn open_store<C>(&self, clock: Arc<C>) -> ConfigResult<PersistenceStore<C>>
    where
        C: Clock + Send + Sync + 'static,
    {
        let store = PersistenceStore::new(self.base_path.clone(), clock);
        store.set_serializer(serializer_for(self.snapshot_format()?))?;
        if self.auto_save {
            store.enable_auto_save(self.auto_save_interval())?;
        }
        Ok(store)
    }
}

/// Task store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Retries granted to tasks created without an explicit limit.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
}

const fn default_max_retries() -> u32 {
    crate::task::domain::DEFAULT_MAX_RETRIES
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            default_max_retries: default_max_retries(),
        }
    }
}

impl TaskConfig {
    /// Builds a task store over `backend` that grants the configured retries
    /// to tasks created without an explicit limit.
    #[must_use]
    pub const fn open_store<B, C>(&self, backend: Arc<B>, clock: Arc<C>) -> TaskStore<B, C>
    where
        B: TaskBackend,
        C: Clock + Send + Sync,
    {
        TaskStore::new(backend, clock).with_default_max_retries(self.default_max_retries)
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, for example
    /// `info,helix_orchestrator=debug`.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    String::from("info")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl OrchestratorConfig {
    /// Parses configuration JSON and validates it. Environment overrides are
    /// not applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed JSON, unknown fields or
    /// invalid values.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Utf8Path>) -> ConfigResult<Self> {
        let file = path.as_ref();
        let json = std::fs::read_to_string(file).map_err(|err| ConfigError::Read {
            path: file.to_owned(),
            source: err,
        })?;
        let mut config = Self::from_json_str(&json)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        tracing::debug!(path = %file, "configuration loaded");
        Ok(config)
    }

    /// Applies `HELIX_LOG` and `HELIX_DATA_DIR` as resolved by `lookup`.
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(filter) = lookup(LOG_ENV).filter(|value| !value.trim().is_empty()) {
            self.logging.filter = filter;
        }
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|value| !value.trim().is_empty()) {
            self.persistence.base_path = Utf8PathBuf::from(dir);
        }
    }

    /// Checks values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Format`] or [`ConfigError::ZeroInterval`].
    pub fn validate(&self) -> ConfigResult<()> {
        self.persistence.snapshot_format()?;
        if self.persistence.auto_save && self.persistence.auto_save_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{adapters::memory::InMemoryTaskBackend, services::CreateTaskRequest};
    use rstest::rstest;
    use std::collections::HashMap;

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn configured_retries_reach_the_task_store() -> eyre::Result<()> {
        let config = OrchestratorConfig::from_json_str(r#"{"tasks": {"default_max_retries": 7}}"#)?;
        let store = config.tasks.open_store(
            Arc::new(InMemoryTaskBackend::new()),
            Arc::new(mockable::DefaultClock),
        );

        let defaulted = store
            .create_task(CreateTaskRequest::new("migrate", "refactoring", "normal"))
            .await?;
        let explicit = store
            .create_task(CreateTaskRequest::new("lint", "testing", "low").with_max_retries(1))
            .await?;

        assert_eq!(defaulted.max_retries(), 7);
        assert_eq!(explicit.max_retries(), 1);
        Ok(())
    }

    #[rstest]
    fn empty_object_gives_defaults() -> eyre::Result<()> {
        let config = OrchestratorConfig::from_json_str("{}")?;

        assert_eq!(config, OrchestratorConfig::default());
        assert_eq!(config.persistence.auto_save_interval(), Duration::from_secs(300));
        assert_eq!(config.tasks.default_max_retries, 3);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.persistence.snapshot_format()?, SnapshotFormat::Json);
        Ok(())
    }

    #[rstest]
    fn file_values_override_defaults() -> eyre::Result<()> {
        let config = OrchestratorConfig::from_json_str(
            r#"{
                "persistence": {"base_path": "/var/lib/helix", "format": "gzip_json", "auto_save": false},
                "tasks": {"default_max_retries": 5}
            }"#,
        )?;

        assert_eq!(config.persistence.base_path, "/var/lib/helix");
        assert_eq!(config.persistence.snapshot_format()?, SnapshotFormat::GzipJson);
        assert!(!config.persistence.auto_save);
        assert_eq!(config.tasks.default_max_retries, 5);
        Ok(())
    }

    #[rstest]
    #[case(r#"{"persistence": {"format": "yaml"}}"#)]
    #[case(r#"{"persistence": {"auto_save_interval_secs": 0}}"#)]
    #[case(r#"{"unknown_section": {}}"#)]
    #[case("not json")]
    fn invalid_config_is_rejected(#[case] json: &str) {
        assert!(OrchestratorConfig::from_json_str(json).is_err());
    }

    #[rstest]
    fn environment_overrides_file_values() -> eyre::Result<()> {
        let mut config = OrchestratorConfig::from_json_str(
            r#"{"logging": {"filter": "warn"}, "persistence": {"base_path": "from-file"}}"#,
        )?;
        let env = HashMap::from([
            (LOG_ENV, String::from("debug")),
            (DATA_DIR_ENV, String::from("from-env")),
        ]);

        config.apply_overrides(|name| env.get(name).cloned());

        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.persistence.base_path, "from-env");
        Ok(())
    }

    #[rstest]
    fn blank_overrides_are_ignored() -> eyre::Result<()> {
        let mut config = OrchestratorConfig::from_json_str("{}")?;
        config.apply_overrides(|_| Some(String::from("  ")));

        assert_eq!(config, OrchestratorConfig::default());
        Ok(())
    }

    #[rstest]
    fn load_reads_a_file() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = Utf8PathBuf::from_path_buf(dir.path().join("helix.json"))
            .map_err(|path| eyre::eyre!("non UTF-8 path {}", path.display()))?;
        std::fs::write(&path, r#"{"tasks": {"default_max_retries": 1}}"#)?;

        let config = OrchestratorConfig::load(&path)?;
        assert_eq!(config.tasks.default_max_retries, 1);

        let missing = OrchestratorConfig::load(path.with_file_name("absent.json"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
        Ok(())
    }
}

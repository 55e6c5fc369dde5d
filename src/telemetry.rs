//! Tracing subscriber setup.

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive does not parse.
    #[error("invalid log filter {directive:?}: {source}")]
    Filter {
        /// Rejected directive.
        directive: String,
        /// Underlying error.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    /// A global subscriber is already installed.
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Builds the filter for a logging configuration.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the directive does not parse.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.filter).map_err(|err| TelemetryError::Filter {
        directive: config.filter.clone(),
        source: err,
    })
}

/// Installs a global registry with an [`EnvFilter`] and a formatting
/// layer.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the directive is invalid or another
/// subscriber was installed first.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;
    tracing::debug!(filter = %config.filter, "tracing initialised");
    Ok(())
}

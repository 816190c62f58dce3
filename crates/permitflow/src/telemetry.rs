//! Logging setup for embedding applications.
//!
//! Library code logs through the `log` facade and opens `tracing` spans;
//! [`init`] routes both into one `tracing-subscriber` fmt layer.

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': {source}")]
    EnvFilter {
        value: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to bridge log records: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("failed to install subscriber: {0}")]
    Subscriber(String),
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init(level: &str) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|source| TelemetryError::EnvFilter {
            value: level.to_string(),
            source,
        })?,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

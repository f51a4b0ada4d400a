//! Logging setup.
//!
//! Installs a `tracing` subscriber with an `EnvFilter` and a stderr fmt
//! layer. When a log directory is configured, a daily-rolling file layer is
//! added; its writer is non-blocking, and the returned guard must be kept
//! alive until exit so buffered lines are flushed.

use std::path::PathBuf;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use tracing_appender::non_blocking::WorkerGuard;

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_FILTER: &str = "lumenimg=info";

const LOG_FILE_PREFIX: &str = "lumenimg.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Filter directive; `RUST_LOG` takes precedence when set.
    pub filter: Option<String>,
    /// Directory for rolling log files.
    pub directory: Option<PathBuf>,
    /// Emit ANSI colours on stderr.
    pub ansi: bool,
}

impl LoggingConfig {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let directive = self.filter.as_deref().unwrap_or(DEFAULT_FILTER);
        EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
            filter: directive.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when file logging is enabled.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = config.env_filter()?;
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi);

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_reported() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig::default().with_filter("lumenimg=verbose");
        assert!(matches!(
            config.env_filter(),
            Err(LoggingError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(LoggingConfig::default().env_filter().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::default()
            .with_filter("lumenimg=debug")
            .with_directory("/tmp/lumenimg-logs")
            .with_ansi(true);
        assert_eq!(config.filter.as_deref(), Some("lumenimg=debug"));
        assert_eq!(config.directory, Some(PathBuf::from("/tmp/lumenimg-logs")));
        assert!(config.ansi);
    }
}

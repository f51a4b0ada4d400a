//! CLI error type.

use std::io;
use std::path::PathBuf;

use lumenimg::config::ConfigError;
use lumenimg::fetch::FetchError;
use lumenimg::logging::LoggingError;
use lumenimg::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("Failed to start pipeline: {0}")]
    Pipeline(#[from] AppError),

    #[error("Failed to build HTTP client: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to set signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] LoggingError),

    #[error("Failed to read catalog {path}: {source}")]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to create async runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("Prefetch task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_failure_is_not_a_config_error() {
        let err = CliError::from(ctrlc::Error::MultipleHandlers);
        assert!(matches!(err, CliError::Signal(_)));
        assert!(err.to_string().starts_with("Failed to set signal handler"));
    }
}

//! Application error types.

use std::fmt;

use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::logging::LoggingError;

/// Errors that can occur while starting the pipeline.
///
/// Nothing on the render or prefetch path returns these; per-image failures
/// are absorbed where they happen.
#[derive(Debug)]
pub enum AppError {
    /// Failed to load or interpret configuration.
    Config(ConfigError),

    /// Failed to build the HTTP client.
    FetchClient(FetchError),

    /// Failed to install logging.
    Logging(LoggingError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::FetchClient(e) => write!(f, "Failed to create HTTP client: {}", e),
            AppError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::FetchClient(e) => Some(e),
            AppError::Logging(e) => Some(e),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        AppError::FetchClient(e)
    }
}

impl From<LoggingError> for AppError {
    fn from(e: LoggingError) -> Self {
        AppError::Logging(e)
    }
}

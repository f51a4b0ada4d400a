//! Shared setup for commands that run the pipeline.

use std::future::Future;
use std::path::Path;

use lumenimg::config::ConfigFile;
use lumenimg::logging::{self, LoggingConfig, WorkerGuard};
use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;

const VERBOSE_FILTER: &str = "lumenimg=debug";

/// Loaded configuration, logging and an async runtime.
pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    /// Load configuration from `config_path` (or the default location) and
    /// install logging.
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let mut logging_config =
            LoggingConfig::default().with_ansi(atty::is(atty::Stream::Stderr));
        if let Some(directory) = &config.logging.directory {
            logging_config = logging_config.with_directory(directory.clone());
        }
        let filter = if verbose {
            Some(VERBOSE_FILTER)
        } else {
            config.logging.filter.as_deref()
        };
        if let Some(filter) = filter {
            logging_config = logging_config.with_filter(filter);
        }
        let log_guard = logging::init(&logging_config)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            config,
            runtime,
            _log_guard: log_guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(version = lumenimg::VERSION, command, "lumenimg starting");
    }

    /// Run a future to completion on the runner's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

//! Configuration file handling.
//!
//! Settings live in an INI file, by default
//! `~/.config/lumenimg/config.ini`:
//!
//! ```ini
//! [cache]
//! capacity = 200
//! eviction_fraction = 0.2
//!
//! [store]
//! backend = disk
//! directory = /var/cache/lumenimg/blobs
//! ttl_hours = 24
//! sweep_interval_secs = 3600
//!
//! [fetch]
//! timeout_secs = 8
//!
//! [prefetch]
//! limit = 10
//! start_delay_ms = 1500
//! ```
//!
//! Missing keys keep their defaults. Every key is described once by
//! [`ConfigKey`], which both loading and the CLI's `config get/set` use.

mod keys;

pub use keys::{ConfigKey, MAX_TTL_HOURS};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;
use tracing::warn;

use crate::capability::ProfileStore;
use crate::fetch::DEFAULT_FETCH_TIMEOUT;
use crate::memo::{DEFAULT_CAPACITY, DEFAULT_EVICTION_FRACTION};
use crate::network::DEFAULT_CLASSIFY_WINDOW;
use crate::prefetch::{DEFAULT_PREFETCH_LIMIT, DEFAULT_START_DELAY};
use crate::store::{DEFAULT_MEMORY_BYTES, DEFAULT_TTL};

const APP_DIR: &str = "lumenimg";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for {section}.{key}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

/// Durable store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreBackendKind {
    #[default]
    Disk,
    Memory,
    None,
}

impl StoreBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackendKind::Disk => "disk",
            StoreBackendKind::Memory => "memory",
            StoreBackendKind::None => "none",
        }
    }
}

impl FromStr for StoreBackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disk" => Ok(StoreBackendKind::Disk),
            "memory" => Ok(StoreBackendKind::Memory),
            "none" | "disabled" | "off" => Ok(StoreBackendKind::None),
            _ => Err(()),
        }
    }
}

impl fmt::Display for StoreBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability probe strategy selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProbeStrategyKind {
    /// Ask the local image decoder registry.
    #[default]
    Decoder,
    /// Parse the configured `Accept` header.
    Accept,
}

impl ProbeStrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStrategyKind::Decoder => "decoder",
            ProbeStrategyKind::Accept => "accept",
        }
    }
}

impl FromStr for ProbeStrategyKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decoder" => Ok(ProbeStrategyKind::Decoder),
            "accept" => Ok(ProbeStrategyKind::Accept),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub capacity: usize,
    pub eviction_fraction: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            eviction_fraction: DEFAULT_EVICTION_FRACTION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub backend: StoreBackendKind,
    /// Disk backend directory; `None` uses the platform cache directory.
    pub directory: Option<PathBuf>,
    pub memory_bytes: u64,
    pub ttl_hours: u64,
    /// `None` sweeps only when the store opens.
    pub sweep_interval_secs: Option<u64>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::Disk,
            directory: None,
            memory_bytes: DEFAULT_MEMORY_BYTES,
            ttl_hours: DEFAULT_TTL.as_secs() / 3600,
            sweep_interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub classify_window_ms: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            classify_window_ms: DEFAULT_CLASSIFY_WINDOW.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchSettings {
    pub limit: usize,
    pub start_delay_ms: u64,
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PREFETCH_LIMIT,
            start_delay_ms: DEFAULT_START_DELAY.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySettings {
    pub strategy: ProbeStrategyKind,
    /// `Accept` header used by the accept strategy.
    pub accept: Option<String>,
    /// Where the probed profile is persisted; `None` uses the cache directory.
    pub profile_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Directory for rolling log files; `None` logs to stderr only.
    pub directory: Option<PathBuf>,
    /// Filter directive, e.g. `lumenimg=debug`.
    pub filter: Option<String>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub store: StoreSettings,
    pub fetch: FetchSettings,
    pub network: NetworkSettings,
    pub prefetch: PrefetchSettings,
    pub capability: CapabilitySettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path().ok_or(ConfigError::NoConfigDir)?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            source: ini::Error::Parse(e),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }

        for (section, properties) in ini.iter() {
            for (name, _) in properties.iter() {
                let known = section.is_some_and(|s| {
                    ConfigKey::all()
                        .iter()
                        .any(|k| k.section() == s && k.key_name() == name)
                });
                if !known {
                    warn!(
                        section = section.unwrap_or(""),
                        key = name,
                        "Ignoring unknown configuration key"
                    );
                }
            }
        }
        Ok(config)
    }

    /// Save to the default location, creating its directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_file_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Save to an explicit path. Unset optional values are omitted.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }
}

/// Default configuration file path.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE_NAME))
}

/// Default durable store directory.
pub fn default_store_directory() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join(APP_DIR).join("blobs"))
}

/// Default capability profile path.
pub fn default_profile_path() -> Option<PathBuf> {
    ProfileStore::default_path()
}

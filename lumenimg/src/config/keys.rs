//! Configuration keys.
//!
//! One variant per setting, addressed as `section.key`. Loading a file,
//! saving it, and the CLI's `config get/set` all go through these.

use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ConfigFile, ProbeStrategyKind, StoreBackendKind};

/// Longest accepted record TTL (ten years).
pub const MAX_TTL_HOURS: u64 = 24 * 365 * 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    CacheCapacity,
    CacheEvictionFraction,
    StoreBackend,
    StoreDirectory,
    StoreMemoryBytes,
    StoreTtlHours,
    StoreSweepIntervalSecs,
    FetchTimeoutSecs,
    FetchUserAgent,
    NetworkClassifyWindowMs,
    PrefetchLimit,
    PrefetchStartDelayMs,
    CapabilityStrategy,
    CapabilityAccept,
    CapabilityProfilePath,
    LoggingDirectory,
    LoggingFilter,
}

impl ConfigKey {
    pub fn all() -> &'static [ConfigKey] {
        use ConfigKey::*;
        &[
            CacheCapacity,
            CacheEvictionFraction,
            StoreBackend,
            StoreDirectory,
            StoreMemoryBytes,
            StoreTtlHours,
            StoreSweepIntervalSecs,
            FetchTimeoutSecs,
            FetchUserAgent,
            NetworkClassifyWindowMs,
            PrefetchLimit,
            PrefetchStartDelayMs,
            CapabilityStrategy,
            CapabilityAccept,
            CapabilityProfilePath,
            LoggingDirectory,
            LoggingFilter,
        ]
    }

    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            CacheCapacity | CacheEvictionFraction => "cache",
            StoreBackend | StoreDirectory | StoreMemoryBytes | StoreTtlHours
            | StoreSweepIntervalSecs => "store",
            FetchTimeoutSecs | FetchUserAgent => "fetch",
            NetworkClassifyWindowMs => "network",
            PrefetchLimit | PrefetchStartDelayMs => "prefetch",
            CapabilityStrategy | CapabilityAccept | CapabilityProfilePath => "capability",
            LoggingDirectory | LoggingFilter => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            CacheCapacity => "capacity",
            CacheEvictionFraction => "eviction_fraction",
            StoreBackend => "backend",
            StoreDirectory => "directory",
            StoreMemoryBytes => "memory_bytes",
            StoreTtlHours => "ttl_hours",
            StoreSweepIntervalSecs => "sweep_interval_secs",
            FetchTimeoutSecs => "timeout_secs",
            FetchUserAgent => "user_agent",
            NetworkClassifyWindowMs => "classify_window_ms",
            PrefetchLimit => "limit",
            PrefetchStartDelayMs => "start_delay_ms",
            CapabilityStrategy => "strategy",
            CapabilityAccept => "accept",
            CapabilityProfilePath => "profile_path",
            LoggingDirectory => "directory",
            LoggingFilter => "filter",
        }
    }

    /// Full dotted name, e.g. `store.ttl_hours`.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as text; empty when an optional value is unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        match self {
            CacheCapacity => config.cache.capacity.to_string(),
            CacheEvictionFraction => config.cache.eviction_fraction.to_string(),
            StoreBackend => config.store.backend.to_string(),
            StoreDirectory => path(&config.store.directory),
            StoreMemoryBytes => config.store.memory_bytes.to_string(),
            StoreTtlHours => config.store.ttl_hours.to_string(),
            StoreSweepIntervalSecs => config
                .store
                .sweep_interval_secs
                .map(|s| s.to_string())
                .unwrap_or_default(),
            FetchTimeoutSecs => config.fetch.timeout_secs.to_string(),
            FetchUserAgent => config.fetch.user_agent.clone().unwrap_or_default(),
            NetworkClassifyWindowMs => config.network.classify_window_ms.to_string(),
            PrefetchLimit => config.prefetch.limit.to_string(),
            PrefetchStartDelayMs => config.prefetch.start_delay_ms.to_string(),
            CapabilityStrategy => config.capability.strategy.as_str().to_string(),
            CapabilityAccept => config.capability.accept.clone().unwrap_or_default(),
            CapabilityProfilePath => path(&config.capability.profile_path),
            LoggingDirectory => path(&config.logging.directory),
            LoggingFilter => config.logging.filter.clone().unwrap_or_default(),
        }
    }

    /// Parse `value` and store it. An empty value clears optional settings.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        match self {
            CacheCapacity => config.cache.capacity = self.parse(value)?,
            CacheEvictionFraction => {
                let fraction: f64 = self.parse(value)?;
                if !(fraction > 0.0 && fraction <= 1.0) {
                    return Err(self.invalid(value));
                }
                config.cache.eviction_fraction = fraction;
            }
            StoreBackend => {
                config.store.backend = value
                    .parse::<StoreBackendKind>()
                    .map_err(|_| self.invalid(value))?
            }
            StoreDirectory => config.store.directory = optional_path(value),
            StoreMemoryBytes => config.store.memory_bytes = self.parse(value)?,
            StoreTtlHours => {
                let hours: u64 = self.parse(value)?;
                if hours == 0 || hours > MAX_TTL_HOURS {
                    return Err(self.invalid(value));
                }
                config.store.ttl_hours = hours;
            }
            StoreSweepIntervalSecs => {
                let secs: Option<u64> = self.parse_optional(value)?;
                if secs == Some(0) {
                    return Err(self.invalid(value));
                }
                config.store.sweep_interval_secs = secs;
            }
            FetchTimeoutSecs => {
                let secs: u64 = self.parse(value)?;
                if secs == 0 {
                    return Err(self.invalid(value));
                }
                config.fetch.timeout_secs = secs;
            }
            FetchUserAgent => config.fetch.user_agent = optional_string(value),
            NetworkClassifyWindowMs => config.network.classify_window_ms = self.parse(value)?,
            PrefetchLimit => config.prefetch.limit = self.parse(value)?,
            PrefetchStartDelayMs => config.prefetch.start_delay_ms = self.parse(value)?,
            CapabilityStrategy => {
                config.capability.strategy = value
                    .parse::<ProbeStrategyKind>()
                    .map_err(|_| self.invalid(value))?
            }
            CapabilityAccept => config.capability.accept = optional_string(value),
            CapabilityProfilePath => config.capability.profile_path = optional_path(value),
            LoggingDirectory => config.logging.directory = optional_path(value),
            LoggingFilter => config.logging.filter = optional_string(value),
        }
        Ok(())
    }

    fn parse<T: FromStr>(&self, value: &str) -> Result<T, ConfigError> {
        value.parse().map_err(|_| self.invalid(value))
    }

    fn parse_optional<T: FromStr>(&self, value: &str) -> Result<Option<T>, ConfigError> {
        if value.is_empty() {
            return Ok(None);
        }
        self.parse(value).map(Some)
    }

    fn invalid(&self, value: &str) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.section(),
            key: self.key_name(),
            value: value.to_string(),
        }
    }
}

fn optional_string(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn optional_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (section, key) = s
            .split_once('.')
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))?;
        ConfigKey::all()
            .iter()
            .copied()
            .find(|k| k.section() == section && k.key_name() == key)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

//! Application configuration for `ImagePipeline`.
//!
//! `AppConfig` is the runtime form of the settings: durations instead of
//! integer seconds, a resolved store backend instead of a kind plus an
//! optional directory. [`AppConfig::from_config_file`] is the single place
//! that translates a [`ConfigFile`] into it.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::config::{
    default_profile_path, default_store_directory, ConfigFile, ProbeStrategyKind,
    StoreBackendKind,
};
use crate::fetch::DEFAULT_FETCH_TIMEOUT;
use crate::memo::{DEFAULT_CAPACITY, DEFAULT_EVICTION_FRACTION};
use crate::network::DEFAULT_CLASSIFY_WINDOW;
use crate::prefetch::PrefetchConfig;
use crate::store::{StoreBackendConfig, DEFAULT_TTL};

/// Memoization cache configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct MemoCacheConfig {
    /// Maximum number of memoized resolutions.
    pub capacity: usize,
    /// Share of entries evicted in one batch when full.
    pub eviction_fraction: f64,
}

impl Default for MemoCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            eviction_fraction: DEFAULT_EVICTION_FRACTION,
        }
    }
}

/// Durable store configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DurableStoreConfig {
    pub backend: StoreBackendConfig,
    /// Records older than this are swept.
    pub ttl: Duration,
    /// Periodic sweep interval; `None` sweeps only at open.
    pub sweep_interval: Option<Duration>,
}

impl Default for DurableStoreConfig {
    fn default() -> Self {
        let backend = match default_store_directory() {
            Some(directory) => StoreBackendConfig::Disk { directory },
            None => StoreBackendConfig::Disabled,
        };
        Self {
            backend,
            ttl: DEFAULT_TTL,
            sweep_interval: None,
        }
    }
}

/// HTTP fetch configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: None,
        }
    }
}

/// Network classification configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    /// How long a classification stays valid.
    pub classify_window: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            classify_window: DEFAULT_CLASSIFY_WINDOW,
        }
    }
}

/// Capability probing configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilityConfig {
    pub strategy: ProbeStrategyKind,
    /// `Accept` header for the accept strategy.
    pub accept: Option<String>,
    /// Where the profile persists; `None` keeps it in memory only.
    pub profile_path: Option<PathBuf>,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            strategy: ProbeStrategyKind::Decoder,
            accept: None,
            profile_path: default_profile_path(),
        }
    }
}

/// Application configuration combining all component configs.
///
/// This is the top-level configuration passed to `ImagePipeline::start()`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppConfig {
    pub memo: MemoCacheConfig,
    pub store: DurableStoreConfig,
    pub fetch: FetchConfig,
    pub network: NetworkConfig,
    pub prefetch: PrefetchConfig,
    pub capability: CapabilityConfig,
    /// Base against which relative image URLs are resolved.
    pub asset_base: Option<Url>,
}

impl AppConfig {
    /// Create application config from a configuration file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        let backend = match config.store.backend {
            StoreBackendKind::Disk => match config
                .store
                .directory
                .clone()
                .or_else(default_store_directory)
            {
                Some(directory) => StoreBackendConfig::Disk { directory },
                None => StoreBackendConfig::Disabled,
            },
            StoreBackendKind::Memory => StoreBackendConfig::Memory {
                max_bytes: config.store.memory_bytes,
            },
            StoreBackendKind::None => StoreBackendConfig::Disabled,
        };

        Self {
            memo: MemoCacheConfig {
                capacity: config.cache.capacity,
                eviction_fraction: config.cache.eviction_fraction,
            },
            store: DurableStoreConfig {
                backend,
                ttl: Duration::from_secs(config.store.ttl_hours.saturating_mul(3600)),
                sweep_interval: config
                    .store
                    .sweep_interval_secs
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
            },
            fetch: FetchConfig {
                timeout: Duration::from_secs(config.fetch.timeout_secs),
                user_agent: config.fetch.user_agent.clone(),
            },
            network: NetworkConfig {
                classify_window: Duration::from_millis(config.network.classify_window_ms),
            },
            prefetch: PrefetchConfig {
                limit: config.prefetch.limit,
                start_delay: Duration::from_millis(config.prefetch.start_delay_ms),
            },
            capability: CapabilityConfig {
                strategy: config.capability.strategy,
                accept: config.capability.accept.clone(),
                profile_path: config
                    .capability
                    .profile_path
                    .clone()
                    .or_else(default_profile_path),
            },
            asset_base: None,
        }
    }

    /// Set the memo cache capacity.
    pub fn with_memo_capacity(mut self, capacity: usize) -> Self {
        self.memo.capacity = capacity;
        self
    }

    /// Set the durable store backend.
    pub fn with_store_backend(mut self, backend: StoreBackendConfig) -> Self {
        self.store.backend = backend;
        self
    }

    /// Set the durable store TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.store.ttl = ttl;
        self
    }

    /// Enable periodic sweeping. A zero interval disables it.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.store.sweep_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch.timeout = timeout;
        self
    }

    pub fn with_classify_window(mut self, window: Duration) -> Self {
        self.network.classify_window = window;
        self
    }

    pub fn with_prefetch(mut self, prefetch: PrefetchConfig) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Persist the capability profile at `path`, or not at all.
    pub fn with_profile_path(mut self, path: Option<PathBuf>) -> Self {
        self.capability.profile_path = path;
        self
    }

    pub fn with_asset_base(mut self, base: Url) -> Self {
        self.asset_base = Some(base);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config_file_defaults() {
        let from_file = AppConfig::from_config_file(&ConfigFile::default());
        let default = AppConfig::default();

        assert_eq!(from_file.memo, default.memo);
        assert_eq!(from_file.store, default.store);
        assert_eq!(from_file.fetch, default.fetch);
        assert_eq!(from_file.network, default.network);
        assert_eq!(from_file.prefetch, default.prefetch);
        assert_eq!(from_file.capability, default.capability);
    }

    #[test]
    fn test_from_config_file() {
        let mut file = ConfigFile::default();
        file.cache.capacity = 64;
        file.store.backend = StoreBackendKind::Memory;
        file.store.memory_bytes = 4096;
        file.store.ttl_hours = 2;
        file.store.sweep_interval_secs = Some(300);
        file.fetch.timeout_secs = 3;
        file.prefetch.start_delay_ms = 250;

        let config = AppConfig::from_config_file(&file);

        assert_eq!(config.memo.capacity, 64);
        assert_eq!(
            config.store.backend,
            StoreBackendConfig::Memory { max_bytes: 4096 }
        );
        assert_eq!(config.store.ttl, Duration::from_secs(7200));
        assert_eq!(config.store.sweep_interval, Some(Duration::from_secs(300)));
        assert_eq!(config.fetch.timeout, Duration::from_secs(3));
        assert_eq!(config.prefetch.start_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_explicit_disk_directory() {
        let mut file = ConfigFile::default();
        file.store.directory = Some(PathBuf::from("/srv/lumenimg"));

        let config = AppConfig::from_config_file(&file);
        assert_eq!(
            config.store.backend,
            StoreBackendConfig::Disk {
                directory: PathBuf::from("/srv/lumenimg")
            }
        );
    }

    #[test]
    fn test_builders() {
        let config = AppConfig::default()
            .with_memo_capacity(10)
            .with_store_backend(StoreBackendConfig::Disabled)
            .with_ttl(Duration::from_secs(60))
            .with_sweep_interval(Duration::from_secs(5))
            .with_fetch_timeout(Duration::from_secs(1))
            .with_profile_path(None);

        assert_eq!(config.memo.capacity, 10);
        assert_eq!(config.store.backend, StoreBackendConfig::Disabled);
        assert_eq!(config.store.ttl, Duration::from_secs(60));
        assert_eq!(config.store.sweep_interval, Some(Duration::from_secs(5)));
        assert_eq!(config.fetch.timeout, Duration::from_secs(1));
        assert!(config.capability.profile_path.is_none());
    }

    #[test]
    fn test_zero_sweep_interval_disables_sweeping() {
        let config = AppConfig::default().with_sweep_interval(Duration::ZERO);
        assert_eq!(config.store.sweep_interval, None);

        let mut file = ConfigFile::default();
        file.store.sweep_interval_secs = Some(0);
        assert_eq!(AppConfig::from_config_file(&file).store.sweep_interval, None);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let mut file = ConfigFile::default();
        file.store.ttl_hours = u64::MAX;

        let config = AppConfig::from_config_file(&file);
        assert_eq!(config.store.ttl, Duration::from_secs(u64::MAX));
    }
}

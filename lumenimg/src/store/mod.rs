//! Durable blob store.
//!
//! Persistent `resolved URL -> bytes` storage with time-based expiry and an
//! idempotent [`ensure_cached`](DurableBlobStore::ensure_cached) operation.
//!
//! ```text
//! ensure_cached(url)
//!     │
//!     ├─ backend unavailable ──────────────────► StorageUnavailable
//!     ├─ record present ───────────────────────► AlreadyCached
//!     └─ join or start the in-flight fetch for url
//!            │  (re-check store, fetch with timeout, put)
//!            ├─ fetched + stored ──────────────► Stored
//!            └─ timeout / transport / status ──► FetchFailed
//! ```
//!
//! No operation returns an error to the caller. Backend and network faults
//! are logged and folded into the outcome, so rendering never waits on or
//! fails because of storage.

mod backend;
mod disk;
mod memory;
mod null;

pub use backend::{BlobBackend, BlobRecord, BoxFuture, RecordMeta, StoreError, SweepResult};
pub use disk::DiskBackend;
pub use memory::{MemoryBackend, DEFAULT_MEMORY_BYTES};
pub use null::NullBackend;

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{FutureExt, Shared};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::fetch::{FetchHandle, DEFAULT_FETCH_TIMEOUT};

/// Records older than this are removed by the sweep.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Result of [`DurableBlobStore::ensure_cached`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnsureOutcome {
    /// A record already existed; no network access happened.
    AlreadyCached,
    /// The payload was fetched and stored.
    Stored,
    /// The fetch failed or timed out; nothing was stored.
    FetchFailed,
    /// No persistent storage is available.
    StorageUnavailable,
}

impl EnsureOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyCached => "already-cached",
            Self::Stored => "stored",
            Self::FetchFailed => "fetch-failed",
            Self::StorageUnavailable => "storage-unavailable",
        }
    }

    /// Whether a record exists for the URL afterwards.
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::AlreadyCached | Self::Stored)
    }
}

impl fmt::Display for EnsureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackendConfig {
    /// One file per record under `directory`.
    Disk { directory: PathBuf },
    /// Process-lifetime storage bounded by `max_bytes`.
    Memory { max_bytes: u64 },
    /// No storage; every operation degrades to a miss.
    Disabled,
}

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub backend: &'static str,
    pub available: bool,
    pub entries: usize,
    pub total_bytes: u64,
    pub expired: usize,
    pub network_fetches: u64,
    pub stored: u64,
    pub fetch_failures: u64,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.available {
            return write!(f, "store ({}): unavailable", self.backend);
        }
        write!(
            f,
            "store ({}): {} records, {} bytes, {} expired; {} fetches, {} stored, {} failed",
            self.backend,
            self.entries,
            self.total_bytes,
            self.expired,
            self.network_fetches,
            self.stored,
            self.fetch_failures
        )
    }
}

type InFlight = Shared<BoxFuture<'static, EnsureOutcome>>;

struct StoreInner {
    backend: Arc<dyn BlobBackend>,
    fetch: FetchHandle,
    ttl: Duration,
    fetch_timeout: Duration,
    in_flight: DashMap<String, InFlight>,
    network_fetches: AtomicU64,
    stored: AtomicU64,
    fetch_failures: AtomicU64,
}

/// Persistent blob store shared across the application.
///
/// Cheap to clone; clones share the backend and the in-flight table.
#[derive(Clone)]
pub struct DurableBlobStore {
    inner: Arc<StoreInner>,
}

impl DurableBlobStore {
    /// Create a store over an already-opened backend.
    pub fn new(
        backend: Arc<dyn BlobBackend>,
        fetch: FetchHandle,
        ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                fetch,
                ttl,
                fetch_timeout,
                in_flight: DashMap::new(),
                network_fetches: AtomicU64::new(0),
                stored: AtomicU64::new(0),
                fetch_failures: AtomicU64::new(0),
            }),
        }
    }

    /// Store with the default TTL and fetch timeout.
    pub fn with_backend(backend: Arc<dyn BlobBackend>, fetch: FetchHandle) -> Self {
        Self::new(backend, fetch, DEFAULT_TTL, DEFAULT_FETCH_TIMEOUT)
    }

    /// Store that has no storage behind it.
    pub fn unavailable(fetch: FetchHandle) -> Self {
        Self::with_backend(Arc::new(NullBackend), fetch)
    }

    /// Open the configured backend and sweep expired records.
    ///
    /// A backend that cannot be opened degrades to [`NullBackend`] with a
    /// warning instead of failing.
    pub async fn open(
        config: &StoreBackendConfig,
        fetch: FetchHandle,
        ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        let store = Self::open_without_sweep(config, fetch, ttl, fetch_timeout).await;
        if store.is_available() {
            let result = store.sweep().await;
            info!(
                backend = store.backend_name(),
                removed = result.removed,
                scanned = result.scanned,
                "Durable store opened"
            );
        }
        store
    }

    /// Open the configured backend and leave existing records untouched.
    ///
    /// Used by tooling that reports on the store before sweeping it.
    pub async fn open_without_sweep(
        config: &StoreBackendConfig,
        fetch: FetchHandle,
        ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        let backend = open_backend(config).await;
        Self::new(backend, fetch, ttl, fetch_timeout)
    }

    pub fn is_available(&self) -> bool {
        self.inner.backend.is_available()
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend.name()
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Make sure a record for `url` exists, fetching at most once.
    ///
    /// Concurrent calls for the same URL share one fetch. The fetch runs on
    /// its own task, so it completes and stores its result even if every
    /// caller stops waiting. The task clears its in-flight entry itself; the
    /// entry guard is held across the insert, so the removal always follows
    /// it.
    pub async fn ensure_cached(&self, url: &str) -> EnsureOutcome {
        let inner = &self.inner;
        if !inner.backend.is_available() {
            return EnsureOutcome::StorageUnavailable;
        }

        match inner.backend.contains(url).await {
            Ok(true) => return EnsureOutcome::AlreadyCached,
            Ok(false) => {}
            Err(e) => {
                warn!(url = %url, error = %e, "Store lookup failed");
                return EnsureOutcome::StorageUnavailable;
            }
        }

        let shared = match inner.in_flight.entry(url.to_string()) {
            Entry::Occupied(entry) => {
                debug!(url = %url, "Joining in-flight fetch");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let task_inner = Arc::clone(inner);
                let key = url.to_string();
                let task = tokio::spawn(async move {
                    let outcome = task_inner.fetch_and_store(&key).await;
                    task_inner.in_flight.remove(&key);
                    outcome
                });
                let fut: BoxFuture<'static, EnsureOutcome> = Box::pin(async move {
                    task.await.unwrap_or_else(|e| {
                        warn!(error = %e, "Fetch task failed");
                        EnsureOutcome::FetchFailed
                    })
                });
                let shared = fut.shared();
                entry.insert(shared.clone());
                shared
            }
        };

        shared.await
    }

    /// Payload for `url`, regardless of age.
    pub async fn get(&self, url: &str) -> Option<Bytes> {
        match self.inner.backend.get(url).await {
            Ok(record) => record.map(|r| r.payload),
            Err(e) => {
                warn!(url = %url, error = %e, "Store read failed");
                None
            }
        }
    }

    /// Store a payload fetched elsewhere. Returns whether it was kept.
    pub async fn put(&self, url: &str, payload: Bytes) -> bool {
        self.put_at(url, payload, SystemTime::now()).await
    }

    /// Store a payload with an explicit timestamp.
    pub async fn put_at(&self, url: &str, payload: Bytes, stored_at: SystemTime) -> bool {
        if !self.is_available() {
            return false;
        }
        match self
            .inner
            .backend
            .put(BlobRecord::new(url, payload, stored_at))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(url = %url, error = %e, "Store write failed");
                false
            }
        }
    }

    /// Remove every record older than the TTL.
    pub async fn sweep(&self) -> SweepResult {
        self.sweep_at(SystemTime::now()).await
    }

    /// Remove every record older than the TTL as of `now`.
    pub async fn sweep_at(&self, now: SystemTime) -> SweepResult {
        let started = Instant::now();
        let backend = &self.inner.backend;

        let entries = match backend.entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Sweep could not list records");
                return SweepResult::default();
            }
        };

        let mut result = SweepResult {
            scanned: entries.len(),
            ..SweepResult::default()
        };
        for meta in entries
            .iter()
            .filter(|m| m.is_expired_at(now, self.inner.ttl))
        {
            match backend.delete(&meta.key).await {
                Ok(true) => {
                    result.removed += 1;
                    result.bytes_freed += meta.size_bytes;
                }
                Ok(false) => {}
                Err(e) => warn!(url = %meta.key, error = %e, "Failed to remove expired record"),
            }
        }
        result.duration_ms = started.elapsed().as_millis() as u64;

        if result.removed > 0 {
            info!(
                removed = result.removed,
                bytes_freed = result.bytes_freed,
                "Expired records swept"
            );
        }
        result
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `cancel` fires.
    ///
    /// A zero interval is refused with a warning; the returned task ends
    /// immediately.
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        if interval.is_zero() {
            warn!("Zero sweep interval, periodic sweep disabled");
            return tokio::spawn(async {});
        }
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately; open() already swept.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let result = store.sweep().await;
                        debug!(%result, "Periodic sweep");
                    }
                }
            }
            debug!("Sweeper stopped");
        })
    }

    /// Entry counts and totals.
    pub async fn stats(&self) -> StoreStats {
        let inner = &self.inner;
        let mut stats = StoreStats {
            backend: inner.backend.name(),
            available: inner.backend.is_available(),
            network_fetches: inner.network_fetches.load(Ordering::Relaxed),
            stored: inner.stored.load(Ordering::Relaxed),
            fetch_failures: inner.fetch_failures.load(Ordering::Relaxed),
            ..StoreStats::default()
        };
        if !stats.available {
            return stats;
        }

        match inner.backend.entries().await {
            Ok(entries) => {
                let now = SystemTime::now();
                stats.entries = entries.len();
                stats.total_bytes = entries.iter().map(|m| m.size_bytes).sum();
                stats.expired = entries
                    .iter()
                    .filter(|m| m.is_expired_at(now, inner.ttl))
                    .count();
            }
            Err(e) => warn!(error = %e, "Could not list records for stats"),
        }
        stats
    }
}

impl fmt::Debug for DurableBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableBlobStore")
            .field("backend", &self.inner.backend.name())
            .field("ttl", &self.inner.ttl)
            .field("in_flight", &self.inner.in_flight.len())
            .finish()
    }
}

impl StoreInner {
    async fn fetch_and_store(&self, url: &str) -> EnsureOutcome {
        // A previous in-flight fetch may have finished since the caller looked.
        match self.backend.contains(url).await {
            Ok(true) => return EnsureOutcome::AlreadyCached,
            Ok(false) => {}
            Err(e) => {
                warn!(url = %url, error = %e, "Store lookup failed");
                return EnsureOutcome::StorageUnavailable;
            }
        }

        self.network_fetches.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let payload = match tokio::time::timeout(self.fetch_timeout, self.fetch.fetch(url)).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                self.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!(url = %url, error = %e, "Fetch failed, not cached");
                return EnsureOutcome::FetchFailed;
            }
            Err(_) => {
                self.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    url = %url,
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "Fetch timed out, not cached"
                );
                return EnsureOutcome::FetchFailed;
            }
        };

        let size = payload.len();
        match self
            .backend
            .put(BlobRecord::new(url, payload, SystemTime::now()))
            .await
        {
            Ok(()) => {
                self.stored.fetch_add(1, Ordering::Relaxed);
                debug!(
                    url = %url,
                    bytes = size,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Payload stored"
                );
                EnsureOutcome::Stored
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Store write failed");
                EnsureOutcome::StorageUnavailable
            }
        }
    }
}

async fn open_backend(config: &StoreBackendConfig) -> Arc<dyn BlobBackend> {
    match config {
        StoreBackendConfig::Disk { directory } => {
            let dir = directory.clone();
            let opened = tokio::task::spawn_blocking(move || DiskBackend::open(dir))
                .await
                .map_err(|e| StoreError::Task(e.to_string()))
                .and_then(|r| r);
            match opened {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    warn!(
                        dir = %directory.display(),
                        error = %e,
                        "Durable storage unavailable, continuing without it"
                    );
                    Arc::new(NullBackend)
                }
            }
        }
        StoreBackendConfig::Memory { max_bytes } => Arc::new(MemoryBackend::new(*max_bytes)),
        StoreBackendConfig::Disabled => {
            info!("Durable storage disabled");
            Arc::new(NullBackend)
        }
    }
}

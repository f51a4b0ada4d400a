//! Storage backend interface for the durable blob store.
//!
//! Backends are deliberately dumb key -> record maps. Expiry, request
//! coalescing and fetch policy live in [`DurableBlobStore`](super::DurableBlobStore).
//!
//! # Dyn Compatibility
//!
//! Async methods return `Pin<Box<dyn Future>>` so the store can hold an
//! `Arc<dyn BlobBackend>` and pick the backend at runtime.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use thiserror::Error;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error during storage operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be decoded.
    #[error("corrupt record {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// Failed to encode a record for storage.
    #[error("failed to encode record: {0}")]
    Encode(String),

    /// Background I/O task failed.
    #[error("storage task failed: {0}")]
    Task(String),

    /// The backend cannot be used in this environment.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// One stored payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    /// The fully-resolved URL the payload was fetched from.
    pub key: String,
    pub payload: Bytes,
    pub stored_at: SystemTime,
}

impl BlobRecord {
    pub fn new(key: impl Into<String>, payload: Bytes, stored_at: SystemTime) -> Self {
        Self {
            key: key.into(),
            payload,
            stored_at,
        }
    }

    /// Record metadata without the payload.
    pub fn meta(&self) -> RecordMeta {
        RecordMeta {
            key: self.key.clone(),
            stored_at: self.stored_at,
            size_bytes: self.payload.len() as u64,
        }
    }
}

/// Record metadata, as listed for sweeps and statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    pub key: String,
    pub stored_at: SystemTime,
    pub size_bytes: u64,
}

impl RecordMeta {
    /// Age relative to `now`; zero for records stamped in the future.
    pub fn age_at(&self, now: SystemTime) -> Duration {
        now.duration_since(self.stored_at).unwrap_or(Duration::ZERO)
    }

    /// Whether the record is older than `ttl` at `now`.
    pub fn is_expired_at(&self, now: SystemTime, ttl: Duration) -> bool {
        self.age_at(now) > ttl
    }
}

/// Result of an expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Records inspected.
    pub scanned: usize,
    /// Records removed as expired.
    pub removed: usize,
    /// Payload bytes freed.
    pub bytes_freed: u64,
    /// Duration of the sweep in milliseconds.
    pub duration_ms: u64,
}

impl fmt::Display for SweepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sweep: scanned {} records, removed {}, freed {} bytes in {}ms",
            self.scanned, self.removed, self.bytes_freed, self.duration_ms
        )
    }
}

/// Convert a timestamp to milliseconds since UNIX_EPOCH, saturating at 0.
pub(crate) fn to_epoch_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u64::MAX as u128) as u64)
        .unwrap_or(0)
}

pub(crate) fn from_epoch_millis(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

/// Persistent key -> record storage.
///
/// All implementations must be `Send + Sync`; concurrent puts for the same
/// key may race and the last writer wins.
pub trait BlobBackend: Send + Sync {
    /// Backend name for logs and statistics.
    fn name(&self) -> &'static str;

    /// False for the no-op backend used when no storage exists.
    fn is_available(&self) -> bool {
        true
    }

    /// Retrieve a record.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<BlobRecord>, StoreError>>;

    /// Store a record, replacing any previous one for the same key.
    fn put(&self, record: BlobRecord) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Check existence without reading the payload.
    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>>;

    /// Delete a record; `Ok(true)` if it existed.
    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>>;

    /// List metadata for every record.
    fn entries(&self) -> BoxFuture<'_, Result<Vec<RecordMeta>, StoreError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let ttl = Duration::from_secs(24 * 60 * 60);
        let meta = RecordMeta {
            key: "k".to_string(),
            stored_at: t,
            size_bytes: 1,
        };

        assert!(!meta.is_expired_at(t + ttl - Duration::from_secs(1), ttl));
        assert!(!meta.is_expired_at(t + ttl, ttl));
        assert!(meta.is_expired_at(t + ttl + Duration::from_millis(1), ttl));
    }

    #[test]
    fn test_future_timestamp_is_not_expired() {
        let now = SystemTime::now();
        let meta = RecordMeta {
            key: "k".to_string(),
            stored_at: now + Duration::from_secs(60),
            size_bytes: 1,
        };
        assert_eq!(meta.age_at(now), Duration::ZERO);
    }

    #[test]
    fn test_epoch_millis_round_trip() {
        let at = UNIX_EPOCH + Duration::from_millis(1_234_567);
        assert_eq!(from_epoch_millis(to_epoch_millis(at)), at);
    }

    #[test]
    fn test_sweep_result_display() {
        let result = SweepResult {
            scanned: 10,
            removed: 3,
            bytes_freed: 2048,
            duration_ms: 5,
        };
        let display = result.to_string();
        assert!(display.contains("removed 3"));
        assert!(display.contains("2048"));
    }

    #[test]
    fn test_store_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: StoreError = io_err.into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}

//! Bounded memoization of resolved URLs.
//!
//! [`MemoCache`] maps `(raw URL, role)` to the resolved transform URL for
//! the lifetime of the process. It sits on the render path, so it does no
//! I/O and every operation is a short critical section.
//!
//! # Eviction
//!
//! Recency is a monotonic touch counter rather than a clock, which keeps
//! ordering exact even when many entries are touched within the same
//! instant. When inserting a new key would exceed capacity, the oldest
//! `ceil(capacity * eviction_fraction)` entries are dropped in one batch:
//!
//! ```text
//! capacity 10, fraction 0.2
//!
//! insert #11 ──► evict 2 least-recently-touched ──► insert ──► len 9
//! insert #12 ──► len 10 (no eviction)
//! ```
//!
//! Batching amortizes the scan over many inserts instead of paying it on
//! every insert once the cache is full.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use crate::catalog::Role;

/// Default number of memoized resolutions.
pub const DEFAULT_CAPACITY: usize = 200;

/// Default share of entries evicted per batch.
pub const DEFAULT_EVICTION_FRACTION: f64 = 0.2;

/// Memoization key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoKey {
    pub raw_url: String,
    pub role: Role,
}

impl MemoKey {
    pub fn new(raw_url: impl Into<String>, role: Role) -> Self {
        Self {
            raw_url: raw_url.into(),
            role,
        }
    }
}

#[derive(Debug)]
struct Slot {
    resolved_url: String,
    inserted_at: Instant,
    last_touch: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<MemoKey, Slot>,
    tick: u64,
}

impl Inner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl fmt::Display for MemoStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memo: {}/{} entries, {} hits, {} misses, {} evicted",
            self.entries, self.capacity, self.hits, self.misses, self.evictions
        )
    }
}

/// Fixed-capacity LRU map from `(raw URL, role)` to resolved URL.
pub struct MemoCache {
    inner: Mutex<Inner>,
    capacity: usize,
    batch: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemoCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    ///
    /// `eviction_fraction` is clamped to `0.0..=1.0`; the batch is always
    /// at least one entry.
    pub fn new(capacity: usize, eviction_fraction: f64) -> Self {
        let capacity = capacity.max(1);
        let fraction = if eviction_fraction.is_finite() {
            eviction_fraction.clamp(0.0, 1.0)
        } else {
            DEFAULT_EVICTION_FRACTION
        };
        // Nudged down so float noise in the product cannot round the batch up.
        let batch = ((capacity as f64 * fraction - 1e-9).ceil().max(0.0) as usize).clamp(1, capacity);

        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
            batch,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Cache with the default capacity and batch fraction.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_EVICTION_FRACTION)
    }

    /// Look up a resolution, refreshing its recency on a hit.
    pub fn get(&self, key: &MemoKey) -> Option<String> {
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();
        match inner.entries.get_mut(key) {
            Some(slot) => {
                slot.last_touch = tick;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(slot.resolved_url.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a resolution. Last writer wins on races.
    pub fn put(&self, key: MemoKey, resolved_url: String) {
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();

        if let Some(slot) = inner.entries.get_mut(&key) {
            slot.resolved_url = resolved_url;
            slot.last_touch = tick;
            return;
        }

        if inner.entries.len() >= self.capacity {
            let evicted = self.evict_batch(&mut inner);
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, capacity = self.capacity, "Memo cache batch eviction");
        }

        inner.entries.insert(
            key,
            Slot {
                resolved_url,
                inserted_at: Instant::now(),
                last_touch: tick,
            },
        );
    }

    fn evict_batch(&self, inner: &mut Inner) -> usize {
        let mut by_age: Vec<(u64, MemoKey)> = inner
            .entries
            .iter()
            .map(|(k, slot)| (slot.last_touch, k.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(touch, _)| *touch);

        let count = self.batch.min(by_age.len());
        for (_, key) in by_age.into_iter().take(count) {
            inner.entries.remove(&key);
        }
        count
    }

    /// Whether a key is present, without touching it.
    pub fn contains(&self, key: &MemoKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// When a key was first inserted, without touching it.
    pub fn inserted_at(&self, key: &MemoKey) -> Option<Instant> {
        self.inner.lock().entries.get(key).map(|s| s.inserted_at)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries removed per eviction batch.
    pub fn eviction_batch(&self) -> usize {
        self.batch
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn stats(&self) -> MemoStats {
        MemoStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for MemoCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("capacity", &self.capacity)
            .field("batch", &self.batch)
            .field("len", &self.len())
            .finish()
    }
}

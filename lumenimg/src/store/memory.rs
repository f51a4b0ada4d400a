//! In-memory blob backend using moka.
//!
//! Used where no writable cache directory exists but the process still
//! benefits from not refetching within a session. Entries are weighed by
//! payload size; moka evicts once the byte budget is exceeded.

use moka::future::Cache as MokaCache;

use super::backend::{BlobBackend, BlobRecord, BoxFuture, RecordMeta, StoreError};

/// Default byte budget for the memory backend (64 MiB).
pub const DEFAULT_MEMORY_BYTES: u64 = 64 * 1024 * 1024;

pub struct MemoryBackend {
    cache: MokaCache<String, BlobRecord>,
    max_bytes: u64,
}

impl MemoryBackend {
    pub fn new(max_bytes: u64) -> Self {
        let cache = MokaCache::builder()
            .weigher(|_key: &String, record: &BlobRecord| -> u32 {
                record.payload.len().min(u32::MAX as usize) as u32
            })
            .max_capacity(max_bytes)
            .build();

        Self { cache, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_BYTES)
    }
}

impl BlobBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<BlobRecord>, StoreError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.get(&key).await) })
    }

    fn put(&self, record: BlobRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.cache.insert(record.key.clone(), record).await;
            Ok(())
        })
    }

    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.contains_key(&key)) })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.remove(&key).await.is_some()) })
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<RecordMeta>, StoreError>> {
        Box::pin(async move {
            self.cache.run_pending_tasks().await;
            Ok(self.cache.iter().map(|(_, record)| record.meta()).collect())
        })
    }
}

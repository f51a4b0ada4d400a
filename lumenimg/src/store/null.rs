//! Backend used when no storage is available at all.
//!
//! Every read misses and every write is discarded. The store checks
//! [`BlobBackend::is_available`] and reports `StorageUnavailable` instead of
//! fetching payloads it cannot keep.

use super::backend::{BlobBackend, BlobRecord, BoxFuture, RecordMeta, StoreError};

#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl BlobBackend for NullBackend {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn get(&self, _key: &str) -> BoxFuture<'_, Result<Option<BlobRecord>, StoreError>> {
        Box::pin(async { Ok(None) })
    }

    fn put(&self, _record: BlobRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async { Ok(()) })
    }

    fn contains(&self, _key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(async { Ok(false) })
    }

    fn delete(&self, _key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(async { Ok(false) })
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<RecordMeta>, StoreError>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

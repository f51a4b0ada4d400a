//! On-disk blob backend.
//!
//! Each record is one file named after the SHA-256 of its key:
//!
//! ```text
//! <dir>/3f2a...e9.blob
//!        ├── bincode header { format_version, key, stored_at_ms }
//!        └── raw payload bytes
//! ```
//!
//! Listing for sweeps reads only the header, never the payload. Writes go
//! to a temp file first and are renamed into place, so readers never see a
//! half-written record. File I/O runs on Tokio's blocking pool.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bincode::Options;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::backend::{
    from_epoch_millis, to_epoch_millis, BlobBackend, BlobRecord, BoxFuture, RecordMeta, StoreError,
};

const FORMAT_VERSION: u16 = 1;
const RECORD_EXTENSION: &str = "blob";

/// Upper bound on an encoded header. A key length past this is corruption,
/// never a real URL.
const MAX_HEADER_BYTES: u64 = 64 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct RecordHeader {
    format_version: u16,
    key: String,
    stored_at_ms: u64,
}

/// Blob backend storing one file per record.
#[derive(Debug)]
pub struct DiskBackend {
    dir: PathBuf,
    temp_seq: AtomicU64,
}

impl DiskBackend {
    /// Open (creating if needed) a store directory.
    ///
    /// Fails when the directory cannot be created or written to; callers
    /// treat that as "no persistent storage in this environment".
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let probe = dir.join(".write-probe");
        std::fs::write(&probe, b"")?;
        std::fs::remove_file(&probe)?;

        debug!(dir = %dir.display(), "Disk blob backend opened");
        Ok(Self {
            dir,
            temp_seq: AtomicU64::new(0),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{:x}.{}", digest, RECORD_EXTENSION))
    }

    fn temp_path(&self, record_path: &Path) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        record_path.with_extension(format!("{}.tmp", seq))
    }
}

fn corrupt(path: &Path, reason: impl ToString) -> StoreError {
    StoreError::Corrupt {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn header_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_HEADER_BYTES)
}

fn read_header(reader: &mut impl Read, path: &Path) -> Result<RecordHeader, StoreError> {
    let header: RecordHeader = header_options()
        .deserialize_from(reader)
        .map_err(|e| corrupt(path, e))?;
    if header.format_version != FORMAT_VERSION {
        return Err(corrupt(
            path,
            format!("unsupported format version {}", header.format_version),
        ));
    }
    Ok(header)
}

fn read_record(path: &Path, key: &str) -> Result<Option<BlobRecord>, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);
    let header = read_header(&mut reader, path)?;
    if header.key != key {
        // Digest collision; treat as absent rather than serve the wrong image.
        warn!(path = %path.display(), "Record key mismatch");
        return Ok(None);
    }

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;
    Ok(Some(BlobRecord::new(
        header.key,
        payload.into(),
        from_epoch_millis(header.stored_at_ms),
    )))
}

fn read_meta(path: &Path) -> Result<RecordMeta, StoreError> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let header = read_header(&mut reader, path)?;
    let header_len = header_options()
        .serialized_size(&header)
        .map_err(|e| corrupt(path, e))?;

    Ok(RecordMeta {
        key: header.key,
        stored_at: from_epoch_millis(header.stored_at_ms),
        size_bytes: file_len.saturating_sub(header_len),
    })
}

fn write_record(path: &Path, temp_path: &Path, record: &BlobRecord) -> Result<(), StoreError> {
    let header = RecordHeader {
        format_version: FORMAT_VERSION,
        key: record.key.clone(),
        stored_at_ms: to_epoch_millis(record.stored_at),
    };

    {
        let file = File::create(temp_path)?;
        let mut writer = BufWriter::new(file);
        header_options()
            .serialize_into(&mut writer, &header)
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        writer.write_all(&record.payload)?;
        writer.flush()?;
    }

    if let Err(e) = std::fs::rename(temp_path, path) {
        let _ = std::fs::remove_file(temp_path);
        return Err(e.into());
    }
    Ok(())
}

fn list_records(dir: &Path) -> Result<Vec<RecordMeta>, StoreError> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
            continue;
        }
        match read_meta(&path) {
            Ok(meta) => entries.push(meta),
            Err(StoreError::Corrupt { reason, .. }) => {
                warn!(path = %path.display(), reason = %reason, "Removing corrupt blob record");
                let _ = std::fs::remove_file(&path);
            }
            // Removed by a concurrent delete between read_dir and open.
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(entries)
}

async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

impl BlobBackend for DiskBackend {
    fn name(&self) -> &'static str {
        "disk"
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<BlobRecord>, StoreError>> {
        let path = self.record_path(key);
        let key = key.to_string();
        Box::pin(blocking(move || read_record(&path, &key)))
    }

    fn put(&self, record: BlobRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        let path = self.record_path(&record.key);
        let temp_path = self.temp_path(&path);
        Box::pin(blocking(move || write_record(&path, &temp_path, &record)))
    }

    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let path = self.record_path(key);
        Box::pin(async move { Ok(tokio::fs::try_exists(&path).await?) })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let path = self.record_path(key);
        Box::pin(async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<RecordMeta>, StoreError>> {
        let dir = self.dir.clone();
        Box::pin(blocking(move || list_records(&dir)))
    }
}

//! Network fetching of transformed image bytes.
//!
//! [`BlobFetcher`] is the seam between the caching layer and HTTP. The
//! production implementation is [`ReqwestFetcher`]; tests substitute mocks.
//! [`FetchWorker`] runs fetches on a background task with a typed
//! request/response contract (`url -> bytes | error`).

mod http;
mod worker;

pub use http::{ReqwestFetcher, DEFAULT_FETCH_TIMEOUT};
pub use worker::{FetchHandle, FetchRequest, FetchResponse, FetchWorker};

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::store::BoxFuture;

/// Errors from fetching a resolved URL. All of them are soft failures to
/// the caching layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request exceeded its time budget.
    #[error("fetch of {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Connection, TLS or body-read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The background worker went away before answering.
    #[error("fetch worker stopped")]
    WorkerStopped,

    /// HTTP client could not be built.
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// True when the failure reflects the link rather than the asset.
    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Timeout { .. } | FetchError::Transport(_))
    }
}

/// Fetches the bytes behind a URL.
pub trait BlobFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'_, Result<Bytes, FetchError>>;
}

//! Background fetch worker.
//!
//! The worker owns a request channel and answers each [`FetchRequest`] on
//! its own spawned task, so foreground fetches issued through the same
//! worker still run in parallel. Serialization, where wanted, is the
//! caller's job (see the prefetch executor).
//!
//! ```text
//! FetchHandle::fetch ──► mpsc ──► worker loop ──spawn──► BlobFetcher::fetch
//!        ▲                                                    │
//!        └───────────────────── oneshot ◄─────────────────────┘
//! ```
//!
//! Requests already queued when the worker stops are still served. After
//! that, handles fall back to calling the fetcher directly on the caller's
//! task.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{BlobFetcher, FetchError};

/// Default request channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Answer to a fetch request.
pub type FetchResponse = Result<Bytes, FetchError>;

/// Typed request sent to the worker.
#[derive(Debug)]
pub struct FetchRequest {
    pub url: String,
    pub reply: oneshot::Sender<FetchResponse>,
}

/// Background fetch worker lifecycle.
pub struct FetchWorker;

impl FetchWorker {
    /// Spawn the worker on the current Tokio runtime.
    ///
    /// The worker stops when `shutdown` is cancelled or every handle is
    /// dropped. Fetches already spawned run to completion.
    pub fn start(
        fetcher: Arc<dyn BlobFetcher>,
        shutdown: CancellationToken,
    ) -> (FetchHandle, JoinHandle<()>) {
        Self::start_with_capacity(fetcher, DEFAULT_CHANNEL_CAPACITY, shutdown)
    }

    pub fn start_with_capacity(
        fetcher: Arc<dyn BlobFetcher>,
        capacity: usize,
        shutdown: CancellationToken,
    ) -> (FetchHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let join = tokio::spawn(Self::run(rx, Arc::clone(&fetcher), shutdown));
        info!(capacity, "Fetch worker started");
        (FetchHandle { tx, fetcher }, join)
    }

    async fn run(
        mut rx: mpsc::Receiver<FetchRequest>,
        fetcher: Arc<dyn BlobFetcher>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                request = rx.recv() => {
                    let Some(request) = request else { break };
                    Self::dispatch(request, Arc::clone(&fetcher));
                }
            }
        }

        // Closing makes new sends fail, so handles fetch inline from here on.
        // Requests already queued are still served.
        rx.close();
        let mut drained = 0usize;
        while let Some(request) = rx.recv().await {
            Self::dispatch(request, Arc::clone(&fetcher));
            drained += 1;
        }
        if drained > 0 {
            debug!(drained, "Served queued fetches after shutdown");
        }
        info!("Fetch worker stopped");
    }

    fn dispatch(request: FetchRequest, fetcher: Arc<dyn BlobFetcher>) {
        tokio::spawn(async move {
            let response = fetcher.fetch(&request.url).await;
            // Requester may have gone away; nothing to report to.
            let _ = request.reply.send(response);
        });
    }
}

/// Cloneable client side of a [`FetchWorker`].
#[derive(Clone)]
pub struct FetchHandle {
    tx: mpsc::Sender<FetchRequest>,
    fetcher: Arc<dyn BlobFetcher>,
}

impl FetchHandle {
    /// Handle with no worker behind it; every fetch runs inline.
    pub fn inline(fetcher: Arc<dyn BlobFetcher>) -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx, fetcher }
    }

    /// Fetch `url` through the worker, or inline if it is not running.
    pub async fn fetch(&self, url: &str) -> FetchResponse {
        let (reply, response_rx) = oneshot::channel();
        let request = FetchRequest {
            url: url.to_string(),
            reply,
        };

        if self.tx.send(request).await.is_err() {
            debug!(url = %url, "Fetch worker not running, fetching inline");
            return self.fetcher.fetch(url).await;
        }

        response_rx.await.unwrap_or(Err(FetchError::WorkerStopped))
    }

    /// Whether a worker is accepting requests.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl std::fmt::Debug for FetchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchHandle")
            .field("running", &self.is_running())
            .finish()
    }
}

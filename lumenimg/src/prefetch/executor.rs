//! Serialized prefetch executor.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::throttler::PrefetchThrottler;
use crate::catalog::ImageReference;
use crate::store::{DurableBlobStore, EnsureOutcome};

/// Number of leading catalog images to prefetch.
pub const DEFAULT_PREFETCH_LIMIT: usize = 10;

/// Delay between the render signal and the first prefetch fetch.
pub const DEFAULT_START_DELAY: Duration = Duration::from_millis(1500);

/// Prefetch configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchConfig {
    /// Maximum number of references taken from the front of the list.
    pub limit: usize,
    /// Wait after the render signal before starting.
    pub start_delay: Duration,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PREFETCH_LIMIT,
            start_delay: DEFAULT_START_DELAY,
        }
    }
}

impl PrefetchConfig {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }
}

/// Summary of one prefetch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    /// References considered (at most the configured limit).
    pub requested: usize,
    /// References handed to the store.
    pub attempted: usize,
    pub stored: usize,
    pub already_cached: usize,
    /// Fetch failures and storage faults.
    pub failed: usize,
    /// Placeholders, and items not attempted because prefetch was throttled.
    pub skipped: usize,
    /// The run stopped early because its context was cancelled.
    pub cancelled: bool,
}

impl PrefetchReport {
    fn record(&mut self, outcome: EnsureOutcome) {
        match outcome {
            EnsureOutcome::Stored => self.stored += 1,
            EnsureOutcome::AlreadyCached => self.already_cached += 1,
            EnsureOutcome::FetchFailed | EnsureOutcome::StorageUnavailable => self.failed += 1,
        }
    }

    /// References that ended with a stored record.
    pub fn cached(&self) -> usize {
        self.stored + self.already_cached
    }
}

impl fmt::Display for PrefetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prefetch: {}/{} attempted, {} stored, {} already cached, {} failed, {} skipped{}",
            self.attempted,
            self.requested,
            self.stored,
            self.already_cached,
            self.failed,
            self.skipped,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}

/// Maps an image reference to the URL that should be cached.
///
/// `None` means the reference resolves to a placeholder and has nothing to
/// fetch.
pub trait UrlResolver: Send + Sync {
    fn resolve_url(&self, reference: &ImageReference) -> Option<String>;
}

/// Background prefetch executor.
///
/// Cheap to clone; each [`schedule`](Self::schedule) call runs on its own
/// task with its own cancellation token.
#[derive(Clone)]
pub struct PrefetchExecutor {
    resolver: Arc<dyn UrlResolver>,
    store: DurableBlobStore,
    throttler: Arc<dyn PrefetchThrottler>,
    config: PrefetchConfig,
}

impl PrefetchExecutor {
    pub fn new(
        resolver: Arc<dyn UrlResolver>,
        store: DurableBlobStore,
        throttler: Arc<dyn PrefetchThrottler>,
        config: PrefetchConfig,
    ) -> Self {
        Self {
            resolver,
            store,
            throttler,
            config,
        }
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    /// Start a prefetch run in the background.
    ///
    /// Cancelling `cancel` stops the run from issuing further fetches. A
    /// fetch already in flight finishes on its own and its result is only
    /// cached.
    pub fn schedule(
        &self,
        references: Vec<ImageReference>,
        cancel: CancellationToken,
    ) -> JoinHandle<PrefetchReport> {
        let executor = self.clone();
        tokio::spawn(async move { executor.run(&references, cancel).await })
    }

    /// Run a prefetch pass on the current task.
    pub async fn run(
        &self,
        references: &[ImageReference],
        cancel: CancellationToken,
    ) -> PrefetchReport {
        let batch = &references[..references.len().min(self.config.limit)];
        let mut report = PrefetchReport {
            requested: batch.len(),
            ..PrefetchReport::default()
        };
        if batch.is_empty() {
            return report;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Prefetch cancelled before start");
                report.cancelled = true;
                return report;
            }
            _ = tokio::time::sleep(self.config.start_delay) => {}
        }

        let started = Instant::now();
        for (index, reference) in batch.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if self.throttler.should_throttle() {
                report.skipped += batch.len() - index;
                info!(
                    state = %self.throttler.state(),
                    remaining = batch.len() - index,
                    "Prefetch throttled"
                );
                break;
            }

            let Some(url) = self.resolver.resolve_url(reference) else {
                report.skipped += 1;
                continue;
            };

            report.attempted += 1;
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    // The store's fetch task keeps running and caches the result.
                    report.cancelled = true;
                    break;
                }
                outcome = self.store.ensure_cached(&url) => outcome,
            };
            debug!(url = %url, role = ?reference.role, outcome = %outcome, "Prefetched");
            report.record(outcome);
        }

        info!(
            %report,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Prefetch finished"
        );
        report
    }
}

impl fmt::Debug for PrefetchExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchExecutor")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}

//! Pipeline bootstrap implementation.
//!
//! `ImagePipeline` is the explicit context object for one application: it
//! owns every cache and background task, and render code receives it (or an
//! `Arc` of it) instead of reaching for process-wide state. Start-up order:
//!
//! 1. Capability probe (loads the persisted profile, probes what is missing)
//! 2. Fetch worker
//! 3. Durable store (opens backend, sweeps, optional sweeper task)
//! 4. Resolver and prefetch executor

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::AppConfig;
use super::error::AppError;
use super::resolver::ImageResolver;
use crate::capability::{
    AcceptHeaderProbe, CapabilityProbe, DecoderProbe, FormatProbe, ProfileStore,
};
use crate::catalog::{CatalogItem, ImageReference};
use crate::config::ProbeStrategyKind;
use crate::fetch::{BlobFetcher, FetchHandle, FetchWorker, ReqwestFetcher};
use crate::memo::{MemoCache, MemoStats};
use crate::network::{ConnectivitySignals, NetworkConditionMonitor, SharedConnectivity};
use crate::prefetch::{NetworkThrottler, PrefetchExecutor, PrefetchReport, UrlResolver};
use crate::render::{ImageRenderAdapter, ImageTile, Resolution, Visibility};
use crate::store::{DurableBlobStore, EnsureOutcome, StoreStats};
use crate::transform::TransformUrlBuilder;

/// Builder for [`ImagePipeline`] with replaceable collaborators.
///
/// Anything not supplied is built from the [`AppConfig`].
pub struct PipelineBuilder {
    config: AppConfig,
    signals: Option<Arc<dyn ConnectivitySignals>>,
    probe: Option<Arc<dyn FormatProbe>>,
    fetcher: Option<Arc<dyn BlobFetcher>>,
}

impl PipelineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            signals: None,
            probe: None,
            fetcher: None,
        }
    }

    /// Use a host-provided connectivity source.
    pub fn with_signals(mut self, signals: Arc<dyn ConnectivitySignals>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Use a specific format-probe strategy.
    pub fn with_probe(mut self, probe: Arc<dyn FormatProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Use a specific fetcher instead of the HTTP client.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn BlobFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Start all services. Must be called inside a Tokio runtime.
    pub async fn start(self) -> Result<ImagePipeline, AppError> {
        let config = self.config;
        info!("Starting image pipeline");

        // 1. Connectivity and capabilities
        let (signals, connectivity) = match self.signals {
            Some(signals) => (signals, None),
            None => {
                let shared = Arc::new(SharedConnectivity::new());
                (Arc::clone(&shared) as Arc<dyn ConnectivitySignals>, Some(shared))
            }
        };
        let monitor = Arc::new(NetworkConditionMonitor::new(
            signals,
            config.network.classify_window,
        ));

        let strategy = self.probe.unwrap_or_else(|| {
            probe_strategy(
                config.capability.strategy,
                config.capability.accept.as_deref(),
            )
        });
        let profile_store = config.capability.profile_path.clone().map(ProfileStore::new);
        let probe = Arc::new(CapabilityProbe::new(strategy, profile_store));
        let profile = probe.warm();
        info!(avif = %profile.avif, webp = %profile.webp, "Capability profile ready");

        // 2. Fetch worker
        let fetcher: Arc<dyn BlobFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(ReqwestFetcher::with_timeout(
                config.fetch.timeout,
                config.fetch.user_agent.as_deref(),
            )?),
        };
        let shutdown = CancellationToken::new();
        let (fetch, worker) = FetchWorker::start(fetcher, shutdown.child_token());

        // 3. Durable store
        let store = DurableBlobStore::open(
            &config.store.backend,
            fetch.clone(),
            config.store.ttl,
            config.fetch.timeout,
        )
        .await;
        let sweeper = match config.store.sweep_interval {
            Some(interval) if store.is_available() => {
                info!(interval_secs = interval.as_secs(), "Periodic sweep enabled");
                Some(store.spawn_sweeper(interval, shutdown.child_token()))
            }
            _ => None,
        };

        // 4. Resolver and prefetch
        let builder = match &config.asset_base {
            Some(base) => TransformUrlBuilder::with_base(base.clone()),
            None => TransformUrlBuilder::new(),
        };
        let memo = MemoCache::new(config.memo.capacity, config.memo.eviction_fraction);
        let resolver = Arc::new(ImageResolver::new(
            Arc::clone(&monitor),
            Arc::clone(&probe),
            builder,
            memo,
        ));
        let prefetch = PrefetchExecutor::new(
            Arc::clone(&resolver) as Arc<dyn UrlResolver>,
            store.clone(),
            Arc::new(NetworkThrottler::new(Arc::clone(&monitor))),
            config.prefetch.clone(),
        );

        info!(
            store = store.backend_name(),
            memo_capacity = config.memo.capacity,
            prefetch_limit = config.prefetch.limit,
            "Image pipeline started"
        );

        Ok(ImagePipeline {
            resolver,
            store,
            prefetch,
            adapter: ImageRenderAdapter::new(),
            connectivity,
            fetch,
            shutdown,
            worker: Some(worker),
            sweeper,
            config,
        })
    }
}

fn probe_strategy(kind: ProbeStrategyKind, accept: Option<&str>) -> Arc<dyn FormatProbe> {
    match kind {
        ProbeStrategyKind::Decoder => Arc::new(DecoderProbe),
        ProbeStrategyKind::Accept => Arc::new(AcceptHeaderProbe::new(accept)),
    }
}

/// Image delivery pipeline for one application context.
pub struct ImagePipeline {
    resolver: Arc<ImageResolver>,
    store: DurableBlobStore,
    prefetch: PrefetchExecutor,
    adapter: ImageRenderAdapter,
    connectivity: Option<Arc<SharedConnectivity>>,
    fetch: FetchHandle,
    shutdown: CancellationToken,
    worker: Option<JoinHandle<()>>,
    sweeper: Option<JoinHandle<()>>,
    config: AppConfig,
}

impl ImagePipeline {
    /// Start the pipeline with the given configuration.
    pub async fn start(config: AppConfig) -> Result<Self, AppError> {
        PipelineBuilder::new(config).start().await
    }

    pub fn builder(config: AppConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Resolve one image reference. Synchronous and I/O-free.
    pub fn resolve(&self, reference: &ImageReference) -> Resolution {
        self.resolver.resolve(reference)
    }

    /// Build the tiles for a render pass over `items`.
    ///
    /// `visibility` reports the viewport state per ordinal position.
    pub fn render(
        &self,
        items: &[CatalogItem],
        visibility: impl Fn(usize) -> Visibility,
    ) -> Vec<ImageTile> {
        ImageReference::from_catalog(items)
            .iter()
            .zip(items)
            .enumerate()
            .map(|(position, (reference, item))| {
                let resolution = self.resolve(reference);
                self.adapter
                    .tile(item.display_label(), &resolution, reference.role, visibility(position))
            })
            .collect()
    }

    /// Schedule a background prefetch of the first catalog images.
    ///
    /// Cancel `cancel` when the view that asked for it goes away.
    pub fn prefetch(
        &self,
        items: &[CatalogItem],
        cancel: CancellationToken,
    ) -> JoinHandle<PrefetchReport> {
        self.prefetch
            .schedule(ImageReference::from_catalog(items), cancel)
    }

    /// Make sure the bytes for a resolved URL are stored.
    pub async fn ensure_cached(&self, url: &str) -> EnsureOutcome {
        self.store.ensure_cached(url).await
    }

    /// Stored bytes for `url`, if present and decodable.
    pub async fn cached_payload(&self, url: &str) -> Option<Bytes> {
        if self.adapter.has_failed(url) {
            return None;
        }
        let payload = self.store.get(url).await?;
        match self.adapter.check_payload(url, &payload) {
            Ok(info) => {
                debug!(url = %url, format = ?info.format, "Serving stored payload");
                Some(payload)
            }
            Err(_) => None,
        }
    }

    /// Connectivity source to push readings into, unless the host supplied
    /// its own.
    pub fn connectivity(&self) -> Option<&Arc<SharedConnectivity>> {
        self.connectivity.as_ref()
    }

    pub fn monitor(&self) -> &Arc<NetworkConditionMonitor> {
        self.resolver.monitor()
    }

    pub fn probe(&self) -> &Arc<CapabilityProbe> {
        self.resolver.probe()
    }

    pub fn store(&self) -> &DurableBlobStore {
        &self.store
    }

    pub fn adapter(&self) -> &ImageRenderAdapter {
        &self.adapter
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn memo_stats(&self) -> MemoStats {
        self.resolver.memo().stats()
    }

    pub async fn store_stats(&self) -> StoreStats {
        self.store.stats().await
    }

    /// Whether the fetch worker is accepting requests.
    pub fn is_running(&self) -> bool {
        self.fetch.is_running()
    }

    /// Stop background tasks and wait for them.
    ///
    /// Fetches already in flight or queued finish. Prefetch runs are not
    /// stopped here; they end when their own cancellation token fires, and
    /// until then their fetches run inline on the caller's task.
    pub async fn shutdown(mut self) {
        info!("Shutting down image pipeline");
        self.shutdown.cancel();

        if let Some(sweeper) = self.sweeper.take() {
            if let Err(e) = sweeper.await {
                warn!(error = %e, "Sweeper task ended abnormally");
            }
        }
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "Fetch worker ended abnormally");
            }
        }
        info!("Image pipeline shut down");
    }
}

impl Drop for ImagePipeline {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for ImagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePipeline")
            .field("resolver", &self.resolver)
            .field("store", &self.store)
            .field("fetch", &self.fetch)
            .finish()
    }
}

//! Integration tests for the image pipeline.
//!
//! These tests drive the public API end to end:
//! - render pass → memo cache → prefetch → durable store
//! - network classes and capability profiles through the policy
//! - cancellation of background prefetch
//! - degraded operation without persistent storage
//!
//! Run with: `cargo test --test pipeline_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use lumenimg::app::{AppConfig, ImagePipeline};
use lumenimg::capability::FixedProbe;
use lumenimg::fetch::{BlobFetcher, FetchError};
use lumenimg::network::{ConnectivitySnapshot, EffectiveType, SharedConnectivity};
use lumenimg::prefetch::PrefetchConfig;
use lumenimg::render::Visibility;
use lumenimg::store::{BoxFuture, EnsureOutcome, StoreBackendConfig};
use lumenimg::{CatalogItem, ImageReference, Resolution, Role};

// ============================================================================
// Helpers
// ============================================================================

/// Fetcher that counts calls per URL and answers after a fixed delay.
#[derive(Default)]
struct CountingFetcher {
    delay: Duration,
    total: AtomicUsize,
    per_url: DashMap<String, usize>,
}

impl CountingFetcher {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn calls_for(&self, url: &str) -> usize {
        self.per_url.get(url).map(|c| *c).unwrap_or(0)
    }
}

impl BlobFetcher for CountingFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'_, Result<Bytes, FetchError>> {
        let url = url.to_string();
        Box::pin(async move {
            self.total.fetch_add(1, Ordering::SeqCst);
            *self.per_url.entry(url.clone()).or_insert(0) += 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(Bytes::from(format!("payload for {}", url)))
        })
    }
}

fn catalog(count: usize) -> Vec<CatalogItem> {
    (0..count)
        .map(|i| {
            CatalogItem::new(
                format!("sku-{}", i),
                format!("Fixture {}", i),
                format!("https://assets.lumen.test/products/{}.jpg", i),
            )
        })
        .collect()
}

fn base_config(backend: StoreBackendConfig) -> AppConfig {
    AppConfig::default()
        .with_store_backend(backend)
        .with_profile_path(None)
        .with_classify_window(Duration::ZERO)
        .with_prefetch(PrefetchConfig::default().with_start_delay(Duration::from_millis(5)))
}

async fn start(
    config: AppConfig,
    signals: Arc<SharedConnectivity>,
    avif: bool,
    webp: bool,
    fetcher: Arc<CountingFetcher>,
) -> ImagePipeline {
    ImagePipeline::builder(config)
        .with_signals(signals)
        .with_probe(Arc::new(FixedProbe::new(avif, webp)))
        .with_fetcher(fetcher)
        .start()
        .await
        .expect("pipeline starts")
}

fn query(resolution: &Resolution) -> &str {
    resolution
        .url()
        .and_then(|u| u.split_once('?'))
        .map(|(_, q)| q)
        .expect("resolved url with query")
}

// ============================================================================
// Policy through the pipeline
// ============================================================================

#[tokio::test]
async fn test_primary_critical_slow_network_without_modern_format() {
    let signals = Arc::new(SharedConnectivity::new());
    signals.update(ConnectivitySnapshot::online(EffectiveType::TwoG));
    let app = start(
        base_config(StoreBackendConfig::Disabled),
        signals,
        false,
        true,
        Arc::new(CountingFetcher::default()),
    )
    .await;

    let resolution = app.resolve(&ImageReference::new(
        "https://assets.lumen.test/products/hero.jpg",
        Role::PrimaryCritical,
    ));
    assert_eq!(query(&resolution), "format=webp&quality=30&width=320&strip=true");

    app.shutdown().await;
}

#[tokio::test]
async fn test_standard_fast_network_with_modern_format() {
    let signals = Arc::new(SharedConnectivity::new());
    signals.update(ConnectivitySnapshot::online(EffectiveType::FourG));
    let app = start(
        base_config(StoreBackendConfig::Disabled),
        signals,
        true,
        true,
        Arc::new(CountingFetcher::default()),
    )
    .await;

    let resolution = app.resolve(&ImageReference::new(
        "https://assets.lumen.test/products/grid.jpg",
        Role::Standard,
    ));
    assert_eq!(query(&resolution), "format=avif&quality=60&width=800&strip=true");

    app.shutdown().await;
}

#[tokio::test]
async fn test_offline_uses_smallest_tier_for_every_role() {
    let signals = Arc::new(SharedConnectivity::new());
    signals.update(ConnectivitySnapshot::offline());
    let app = start(
        base_config(StoreBackendConfig::Disabled),
        signals,
        true,
        true,
        Arc::new(CountingFetcher::default()),
    )
    .await;

    for (position, role) in [
        Role::PrimaryCritical,
        Role::SecondaryCritical,
        Role::TertiaryCritical,
        Role::Standard,
    ]
    .into_iter()
    .enumerate()
    {
        let resolution = app.resolve(&ImageReference::new(
            format!("https://assets.lumen.test/products/{}.jpg", position),
            role,
        ));
        let query = query(&resolution);
        assert!(query.contains("quality=30"), "{:?}: {}", role, query);
        assert!(query.contains("width=320"), "{:?}: {}", role, query);
    }

    app.shutdown().await;
}

#[tokio::test]
async fn test_save_data_counts_as_slow() {
    let signals = Arc::new(SharedConnectivity::new());
    signals.update(ConnectivitySnapshot::online(EffectiveType::FourG).with_save_data(true));
    let app = start(
        base_config(StoreBackendConfig::Disabled),
        signals,
        true,
        true,
        Arc::new(CountingFetcher::default()),
    )
    .await;

    let resolution = app.resolve(&ImageReference::new(
        "https://assets.lumen.test/products/second.jpg",
        Role::SecondaryCritical,
    ));
    assert_eq!(query(&resolution), "format=webp&quality=30&width=320&strip=true");

    app.shutdown().await;
}

// ============================================================================
// Render → prefetch → durable store
// ============================================================================

#[tokio::test]
async fn test_render_then_prefetch_populates_disk_store() {
    let dir = tempfile::tempdir().unwrap();
    let backend = StoreBackendConfig::Disk {
        directory: dir.path().to_path_buf(),
    };
    let fetcher = Arc::new(CountingFetcher::default());
    let items = catalog(14);

    let app = start(
        base_config(backend.clone()),
        Arc::new(SharedConnectivity::new()),
        false,
        true,
        Arc::clone(&fetcher),
    )
    .await;

    let tiles = app.render(&items, |_| Visibility::Unobserved);
    assert_eq!(tiles.len(), 14);
    assert!(tiles.iter().all(|t| !t.is_placeholder));
    assert_eq!(fetcher.total(), 0, "render pass must not fetch");

    let report = app
        .prefetch(&items, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.requested, 10);
    assert_eq!(report.stored, 10);
    assert_eq!(fetcher.total(), 10);

    // Prefetch resolved through the memo filled by the render pass.
    assert!(app.memo_stats().hits >= 10);
    for tile in &tiles[..10] {
        assert!(app.store().get(&tile.src).await.is_some());
        assert_eq!(fetcher.calls_for(&tile.src), 1);
    }
    assert!(app.store().get(&tiles[10].src).await.is_none());
    app.shutdown().await;

    // A new pipeline over the same directory finds everything cached.
    let reloaded = start(
        base_config(backend),
        Arc::new(SharedConnectivity::new()),
        false,
        true,
        Arc::clone(&fetcher),
    )
    .await;
    let again = reloaded
        .prefetch(&items, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.already_cached, 10);
    assert_eq!(fetcher.total(), 10);
    assert_eq!(reloaded.store_stats().await.entries, 10);

    reloaded.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_ensure_cached_fetches_once() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(CountingFetcher::with_delay(Duration::from_millis(40)));
    let app = Arc::new(
        start(
            base_config(StoreBackendConfig::Disk {
                directory: dir.path().to_path_buf(),
            }),
            Arc::new(SharedConnectivity::new()),
            true,
            true,
            Arc::clone(&fetcher),
        )
        .await,
    );
    let url = "https://assets.lumen.test/products/7.jpg?format=avif&quality=60&width=800&strip=true";

    let calls: Vec<_> = (0..6)
        .map(|_| {
            let app = Arc::clone(&app);
            tokio::spawn(async move { app.ensure_cached(url).await })
        })
        .collect();
    for call in calls {
        assert!(call.await.unwrap().is_cached());
    }
    assert_eq!(app.ensure_cached(url).await, EnsureOutcome::AlreadyCached);
    assert_eq!(fetcher.calls_for(url), 1);
}

#[tokio::test]
async fn test_cancelled_prefetch_stops_scheduling() {
    let fetcher = Arc::new(CountingFetcher::with_delay(Duration::from_millis(50)));
    let app = start(
        base_config(StoreBackendConfig::Memory { max_bytes: 1 << 20 }),
        Arc::new(SharedConnectivity::new()),
        false,
        true,
        Arc::clone(&fetcher),
    )
    .await;
    let items = catalog(10);
    let view = CancellationToken::new();

    let handle = app.prefetch(&items, view.clone());
    tokio::time::sleep(Duration::from_millis(80)).await;
    view.cancel();
    let report = handle.await.unwrap();

    assert!(report.cancelled);
    assert!(report.attempted < 10);

    // Let any in-flight fetch land; nothing new is scheduled afterwards.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(fetcher.total(), report.attempted);

    app.shutdown().await;
}

#[tokio::test]
async fn test_prefetch_skipped_while_offline() {
    let signals = Arc::new(SharedConnectivity::new());
    signals.update(ConnectivitySnapshot::offline());
    let fetcher = Arc::new(CountingFetcher::default());
    let app = start(
        base_config(StoreBackendConfig::Memory { max_bytes: 1 << 20 }),
        signals,
        true,
        true,
        Arc::clone(&fetcher),
    )
    .await;

    let report = app
        .prefetch(&catalog(5), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(report.skipped, 5);
    assert_eq!(fetcher.total(), 0);

    app.shutdown().await;
}

// ============================================================================
// Degraded storage
// ============================================================================

#[tokio::test]
async fn test_storage_unavailable_keeps_serving_urls() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-directory");
    std::fs::write(&blocker, b"").unwrap();

    let fetcher = Arc::new(CountingFetcher::default());
    let app = start(
        base_config(StoreBackendConfig::Disk { directory: blocker }),
        Arc::new(SharedConnectivity::new()),
        true,
        true,
        Arc::clone(&fetcher),
    )
    .await;
    assert!(!app.store().is_available());

    let items = catalog(4);
    let first = app.render(&items, |_| Visibility::Unobserved);
    let second = app.render(&items, |_| Visibility::Unobserved);
    assert_eq!(first, second);
    assert!(first.iter().all(|t| !t.is_placeholder));
    assert_eq!(app.memo_stats().hits, 4);

    assert_eq!(
        app.ensure_cached(&first[0].src).await,
        EnsureOutcome::StorageUnavailable
    );
    let report = app
        .prefetch(&items, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.stored, 0);
    assert_eq!(fetcher.total(), 0);

    app.shutdown().await;
}

#[tokio::test]
async fn test_placeholder_for_missing_image() {
    let app = start(
        base_config(StoreBackendConfig::Disabled),
        Arc::new(SharedConnectivity::new()),
        true,
        true,
        Arc::new(CountingFetcher::default()),
    )
    .await;
    let items = vec![
        CatalogItem::new("a", "Cone Pendant", "https://assets.lumen.test/a.jpg"),
        CatalogItem::new("b", "Frosted Globe", "   "),
    ];

    let tiles = app.render(&items, |_| Visibility::Unobserved);
    assert!(!tiles[0].is_placeholder);
    assert!(tiles[1].is_placeholder);
    assert_eq!(tiles[1].alt, "Frosted Globe");
    assert!(tiles[1].src.starts_with("data:image/svg+xml,"));

    app.shutdown().await;
}

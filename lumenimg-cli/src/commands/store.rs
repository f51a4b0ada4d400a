//! Durable store CLI commands.
//!
//! These open the store on its own, without starting the pipeline, so that
//! `stats` reports expired records before anything sweeps them.

use std::sync::Arc;

use clap::Subcommand;
use lumenimg::fetch::{FetchHandle, ReqwestFetcher};
use lumenimg::store::DurableBlobStore;
use lumenimg::AppConfig;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Store action subcommands.
#[derive(Debug, Subcommand)]
pub enum StoreAction {
    /// Remove records older than the configured TTL
    Sweep,
    /// Show durable store statistics
    Stats,
}

/// Run a store subcommand.
pub fn run(runner: &CliRunner, action: StoreAction) -> Result<(), CliError> {
    runner.log_startup("store");
    let config = AppConfig::from_config_file(runner.config());

    runner.block_on(async {
        let store = open_store(&config).await?;
        println!("{}", execute(&store, action).await);
        Ok::<(), CliError>(())
    })
}

/// Open the configured store without the open-time sweep.
async fn open_store(config: &AppConfig) -> Result<DurableBlobStore, CliError> {
    let fetcher = ReqwestFetcher::with_timeout(
        config.fetch.timeout,
        config.fetch.user_agent.as_deref(),
    )?;
    Ok(DurableBlobStore::open_without_sweep(
        &config.store.backend,
        FetchHandle::inline(Arc::new(fetcher)),
        config.store.ttl,
        config.fetch.timeout,
    )
    .await)
}

async fn execute(store: &DurableBlobStore, action: StoreAction) -> String {
    if !store.is_available() {
        return format!(
            "Durable store is unavailable (backend: {})",
            store.backend_name()
        );
    }

    match action {
        StoreAction::Sweep => {
            let result = store.sweep().await;
            format!(
                "Swept {} store (ttl {}h)\n{}",
                store.backend_name(),
                store.ttl().as_secs() / 3600,
                result
            )
        }
        StoreAction::Stats => store.stats().await.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use lumenimg::store::{StoreBackendConfig, DEFAULT_TTL};
    use std::time::SystemTime;

    fn disk_config(dir: &std::path::Path) -> AppConfig {
        AppConfig::default().with_store_backend(StoreBackendConfig::Disk {
            directory: dir.to_path_buf(),
        })
    }

    #[tokio::test]
    async fn test_stats_reports_expired_before_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let config = disk_config(dir.path());

        let store = open_store(&config).await.unwrap();
        store
            .put_at(
                "https://cdn.test/stale.jpg",
                Bytes::from_static(b"s"),
                SystemTime::now() - 2 * DEFAULT_TTL,
            )
            .await;
        store
            .put("https://cdn.test/fresh.jpg", Bytes::from_static(b"f"))
            .await;
        drop(store);

        let store = open_store(&config).await.unwrap();
        let stats = execute(&store, StoreAction::Stats).await;
        assert!(stats.contains("2 records"), "{}", stats);
        assert!(stats.contains("1 expired"), "{}", stats);

        let swept = execute(&store, StoreAction::Sweep).await;
        assert!(swept.contains("removed 1"), "{}", swept);
        assert_eq!(store.stats().await.entries, 1);
    }

    #[tokio::test]
    async fn test_disabled_store_reports_unavailable() {
        let config = AppConfig::default().with_store_backend(StoreBackendConfig::Disabled);
        let store = open_store(&config).await.unwrap();

        let output = execute(&store, StoreAction::Stats).await;
        assert!(output.contains("unavailable"), "{}", output);
    }
}

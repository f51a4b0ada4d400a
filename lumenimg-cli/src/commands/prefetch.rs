//! Prefetch command - warm the durable store with the first catalog images.

use std::path::PathBuf;
use std::time::Duration;

use lumenimg::AppConfig;
use tokio_util::sync::CancellationToken;

use super::common::{pipeline_builder, read_catalog, NetworkArg};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the prefetch command.
pub struct PrefetchArgs {
    pub catalog: PathBuf,
    pub limit: Option<usize>,
    pub no_delay: bool,
    pub network: Option<NetworkArg>,
    pub accept: Option<String>,
}

/// Run the prefetch command.
pub fn run(runner: &CliRunner, args: PrefetchArgs) -> Result<(), CliError> {
    runner.log_startup("prefetch");
    let items = read_catalog(&args.catalog)?;

    let mut config = AppConfig::from_config_file(runner.config());
    let mut prefetch = config.prefetch.clone();
    if let Some(limit) = args.limit {
        prefetch = prefetch.with_limit(limit);
    }
    if args.no_delay {
        prefetch = prefetch.with_start_delay(Duration::ZERO);
    }
    config = config.with_prefetch(prefetch);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received interrupt, stopping prefetch...");
        handler_token.cancel();
    })
    .map_err(CliError::Signal)?;

    runner.block_on(async {
        let pipeline = pipeline_builder(config, args.network, args.accept.as_deref())
            .start()
            .await?;

        if !pipeline.store().is_available() {
            println!("Durable store is unavailable; nothing will be stored.");
        }
        println!(
            "Prefetching up to {} of {} images (store: {})",
            pipeline.config().prefetch.limit,
            items.len(),
            pipeline.store().backend_name()
        );

        let report = pipeline
            .prefetch(&items, cancel)
            .await
            .map_err(|e| CliError::Task(e.to_string()))?;

        println!("{}", report);
        pipeline.shutdown().await;
        Ok::<(), CliError>(())
    })
}

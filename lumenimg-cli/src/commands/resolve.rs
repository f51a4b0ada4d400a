//! Resolve command - print the transform URL chosen for each catalog image.

use std::path::PathBuf;

use lumenimg::render::{ImageRenderAdapter, Visibility};
use lumenimg::{AppConfig, ImageReference, Resolution};
use serde_json::json;

use super::common::{pipeline_builder, read_catalog, NetworkArg};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the resolve command.
pub struct ResolveArgs {
    pub catalog: PathBuf,
    pub network: Option<NetworkArg>,
    pub accept: Option<String>,
    pub json: bool,
}

/// Run the resolve command.
pub fn run(runner: &CliRunner, args: ResolveArgs) -> Result<(), CliError> {
    runner.log_startup("resolve");
    let items = read_catalog(&args.catalog)?;
    let config = AppConfig::from_config_file(runner.config());

    runner.block_on(async {
        let pipeline = pipeline_builder(config, args.network, args.accept.as_deref())
            .start()
            .await?;
        let class = pipeline.monitor().classify();
        let profile = pipeline.probe().profile();

        let rows: Vec<_> = ImageReference::from_catalog(&items)
            .into_iter()
            .zip(&items)
            .map(|(reference, item)| {
                let resolution = pipeline.resolve(&reference);
                let hints = ImageRenderAdapter::hints(reference.role, Visibility::Unobserved);
                (item, reference.role, resolution, hints)
            })
            .collect();

        if args.json {
            let entries: Vec<_> = rows
                .iter()
                .map(|(item, role, resolution, hints)| {
                    json!({
                        "id": item.id,
                        "role": role.as_str(),
                        "url": resolution.url(),
                        "placeholder": resolution.is_placeholder(),
                        "loading": hints.loading.as_str(),
                        "fetchpriority": hints.priority.as_str(),
                    })
                })
                .collect();
            let output = json!({
                "network": class.as_str(),
                "avif": profile.avif.to_string(),
                "webp": profile.webp.to_string(),
                "images": entries,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Network:      {}", class);
            println!("Capabilities: avif={} webp={}", profile.avif, profile.webp);
            println!();
            for (position, (item, role, resolution, hints)) in rows.iter().enumerate() {
                let target = match resolution {
                    Resolution::Url(url) => url.as_str(),
                    Resolution::Placeholder => "(placeholder)",
                };
                println!("{:>4}  {:<20} {:<18} {}", position, item.id, role.as_str(), hints);
                println!("      {}", target);
            }
        }

        pipeline.shutdown().await;
        Ok::<(), CliError>(())
    })
}

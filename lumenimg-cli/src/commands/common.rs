//! Common types and utilities shared across CLI commands.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;
use lumenimg::app::{AppConfig, PipelineBuilder};
use lumenimg::capability::AcceptHeaderProbe;
use lumenimg::network::{ConnectivitySnapshot, EffectiveType, SharedConnectivity};
use lumenimg::{CatalogItem, ImagePipeline};

use crate::error::CliError;

/// Network class selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum NetworkArg {
    /// 4g link
    Fast,
    /// 2g link
    Slow,
    /// No connectivity
    Offline,
}

impl NetworkArg {
    /// Connectivity reading that classifies as this network class.
    pub fn snapshot(self) -> ConnectivitySnapshot {
        match self {
            NetworkArg::Fast => ConnectivitySnapshot::online(EffectiveType::FourG),
            NetworkArg::Slow => ConnectivitySnapshot::online(EffectiveType::TwoG),
            NetworkArg::Offline => ConnectivitySnapshot::offline(),
        }
    }
}

/// Read a catalog from a JSON file, or from stdin when `path` is `-`.
pub fn read_catalog(path: &Path) -> Result<Vec<CatalogItem>, CliError> {
    let read_err = |source| CliError::CatalogRead {
        path: path.to_path_buf(),
        source,
    };

    let text = if path == Path::new("-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).map_err(read_err)?;
        text
    } else {
        fs::read_to_string(path).map_err(read_err)?
    };

    Ok(serde_json::from_str(&text)?)
}

/// Pipeline builder with CLI overrides applied.
///
/// A simulated `accept` header neither reads nor writes the persisted
/// capability profile.
pub fn pipeline_builder(
    config: AppConfig,
    network: Option<NetworkArg>,
    accept: Option<&str>,
) -> PipelineBuilder {
    let config = if accept.is_some() {
        config.with_profile_path(None)
    } else {
        config
    };
    let mut builder = ImagePipeline::builder(config);
    if let Some(network) = network {
        let signals = Arc::new(SharedConnectivity::new());
        signals.update(network.snapshot());
        builder = builder.with_signals(signals);
    }
    if let Some(accept) = accept {
        builder = builder.with_probe(Arc::new(AcceptHeaderProbe::new(Some(accept))));
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumenimg::capability::{CapabilityProfile, ImageFormat, ProfileStore};
    use lumenimg::network::NetworkClass;
    use lumenimg::store::StoreBackendConfig;

    #[test]
    fn test_network_arg_classifies() {
        assert_eq!(NetworkArg::Fast.snapshot().classify(), NetworkClass::Fast);
        assert_eq!(NetworkArg::Slow.snapshot().classify(), NetworkClass::Slow);
        assert_eq!(NetworkArg::Offline.snapshot().classify(), NetworkClass::Offline);
    }

    #[test]
    fn test_read_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"[{"id":"a","label":"Arc Lamp","image_urls":["https://assets.lumen.test/a.jpg"]}]"#,
        )
        .unwrap();

        let items = read_catalog(&path).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].primary_image(), Some("https://assets.lumen.test/a.jpg"));
    }

    #[test]
    fn test_read_catalog_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(read_catalog(&path), Err(CliError::Json(_))));
    }

    #[test]
    fn test_read_catalog_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_catalog(&dir.path().join("absent.json")),
            Err(CliError::CatalogRead { .. })
        ));
    }

    #[tokio::test]
    async fn test_accept_override_ignores_persisted_profile() {
        let dir = tempfile::tempdir().unwrap();
        let profile_path = dir.path().join("capabilities.json");
        let persisted = ProfileStore::new(profile_path.clone());
        persisted
            .save(&CapabilityProfile::with_support(true, true))
            .unwrap();

        let config = AppConfig::default()
            .with_store_backend(StoreBackendConfig::Disabled)
            .with_profile_path(Some(profile_path));
        let pipeline = pipeline_builder(config, Some(NetworkArg::Fast), Some("image/webp,*/*"))
            .start()
            .await
            .unwrap();

        let profile = pipeline.probe().profile();
        assert!(!profile.supports(ImageFormat::Avif));
        assert!(profile.supports(ImageFormat::WebP));
        pipeline.shutdown().await;

        assert!(persisted.load().unwrap().supports(ImageFormat::Avif));
    }
}

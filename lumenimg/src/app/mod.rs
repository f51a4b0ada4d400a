//! Application context and lifecycle.
//!
//! [`ImagePipeline`] wires every component together once per application
//! and is threaded through render code explicitly. Tests build as many
//! independent pipelines as they like; nothing is shared through globals.
//!
//! # Example
//!
//! ```ignore
//! use lumenimg::app::{AppConfig, ImagePipeline};
//! use lumenimg::render::Visibility;
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = ImagePipeline::start(AppConfig::default()).await?;
//!
//! // Render pass: synchronous, no I/O
//! let tiles = pipeline.render(&items, |_| Visibility::Unobserved);
//!
//! // After first paint: background prefetch tied to the view's lifetime
//! let view = CancellationToken::new();
//! pipeline.prefetch(&items, view.clone());
//!
//! // Navigation away
//! view.cancel();
//! pipeline.shutdown().await;
//! ```

mod bootstrap;
mod config;
mod error;
mod resolver;

pub use bootstrap::{ImagePipeline, PipelineBuilder};
pub use config::{
    AppConfig, CapabilityConfig, DurableStoreConfig, FetchConfig, MemoCacheConfig, NetworkConfig,
};
pub use error::AppError;
pub use resolver::ImageResolver;
pub use crate::render::Resolution;

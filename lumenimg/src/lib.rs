//! lumenimg - Adaptive product-image delivery for storefront rendering
//!
//! This library decides, per product image and per client condition, which
//! encoded variant to request from the image transform endpoint, memoizes
//! that decision, and pre-populates a durable blob cache in the background
//! without competing with first paint.
//!
//! # Architecture
//!
//! ```text
//! CatalogItem[] ──► ImageReference (role from ordinal)
//!                        │
//!                        ▼
//! ┌───────────────────────────────────────────────────────┐
//! │                     ImagePipeline                     │
//! │                                                       │
//! │  MemoCache ──hit──► resolved URL                      │
//! │     │ miss                                            │
//! │     ▼                                                 │
//! │  NetworkMonitor + CapabilityProbe ──► TransformPolicy │
//! │     │                                                 │
//! │     ▼                                                 │
//! │  TransformUrlBuilder::apply ──► MemoCache::put        │
//! │                                                       │
//! │  PrefetchExecutor ──serial──► DurableBlobStore        │
//! │                                  └── FetchWorker      │
//! └───────────────────────────────────────────────────────┘
//!                        │
//!                        ▼
//!           ImageRenderAdapter (loading / priority hints)
//! ```
//!
//! The resolution path is synchronous and does no I/O. Everything that
//! touches the network or the filesystem is async and absorbs its own
//! failures.

pub mod app;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod fetch;
pub mod logging;
pub mod memo;
pub mod network;
pub mod prefetch;
pub mod render;
pub mod store;
pub mod transform;

pub use app::{AppConfig, AppError, ImagePipeline, Resolution};
pub use catalog::{CatalogItem, ImageReference, Role};

/// Library version, used to tag persisted artifacts.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

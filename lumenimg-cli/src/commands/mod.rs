//! CLI command implementations.

pub mod common;
pub mod config;
pub mod prefetch;
pub mod resolve;
pub mod store;

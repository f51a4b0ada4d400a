//! Background prefetch.
//!
//! After the first render pass settles, [`PrefetchExecutor`] resolves the
//! first few catalog images and makes sure their bytes are in the
//! [`DurableBlobStore`](crate::store::DurableBlobStore). Fetches are issued
//! strictly one at a time so foreground critical-image requests keep the
//! bandwidth.

mod executor;
mod throttler;

pub use executor::{
    PrefetchConfig, PrefetchExecutor, PrefetchReport, UrlResolver, DEFAULT_PREFETCH_LIMIT,
    DEFAULT_START_DELAY,
};
pub use throttler::{
    AlwaysThrottle, NetworkThrottler, NeverThrottle, PrefetchThrottler, ThrottleState,
};

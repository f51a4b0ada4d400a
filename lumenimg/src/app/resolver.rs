//! Synchronous image URL resolution.
//!
//! The per-item render path: memo lookup, then on a miss the transform
//! policy plus URL construction. No I/O happens here once the capability
//! profile has been warmed.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::capability::CapabilityProbe;
use crate::catalog::ImageReference;
use crate::memo::{MemoCache, MemoKey};
use crate::network::{NetworkClass, NetworkConditionMonitor};
use crate::prefetch::UrlResolver;
use crate::render::Resolution;
use crate::transform::{TransformPolicy, TransformUrlBuilder};

/// Resolves image references to transformed URLs.
pub struct ImageResolver {
    monitor: Arc<NetworkConditionMonitor>,
    probe: Arc<CapabilityProbe>,
    builder: TransformUrlBuilder,
    memo: MemoCache,
    last_class: Mutex<Option<NetworkClass>>,
}

impl ImageResolver {
    pub fn new(
        monitor: Arc<NetworkConditionMonitor>,
        probe: Arc<CapabilityProbe>,
        builder: TransformUrlBuilder,
        memo: MemoCache,
    ) -> Self {
        Self {
            monitor,
            probe,
            builder,
            memo,
            last_class: Mutex::new(None),
        }
    }

    /// Resolve one reference.
    ///
    /// Empty or unparsable URLs short-circuit to a placeholder before any
    /// transform is selected.
    pub fn resolve(&self, reference: &ImageReference) -> Resolution {
        let network = self.monitor.classify();
        self.observe_network(network);

        let key = MemoKey::new(reference.raw_url.as_str(), reference.role);
        if let Some(url) = self.memo.get(&key) {
            trace!(url = %url, role = %reference.role, "Resolution memo hit");
            return Resolution::Url(url);
        }

        let asset = match self.builder.parse(&reference.raw_url) {
            Ok(asset) => asset,
            Err(e) => {
                trace!(url = %reference.raw_url, error = %e, "Unresolvable image URL");
                return Resolution::Placeholder;
            }
        };

        let mut profile = self.probe.profile();
        if !profile.is_complete() {
            profile = self.probe.warm();
        }

        let spec = TransformPolicy::resolve(reference.role, &profile, network);
        let resolved = self.builder.apply(asset, &spec);
        debug!(
            url = %resolved,
            role = %reference.role,
            network = %network,
            "Resolved image URL"
        );
        self.memoize(key, resolved.clone(), network);
        Resolution::Url(resolved)
    }

    /// Store a resolution chosen under `network`, unless the class moved on
    /// while it was being built. Holding the class lock orders the write
    /// against the clear in [`observe_network`](Self::observe_network).
    fn memoize(&self, key: MemoKey, url: String, network: NetworkClass) {
        let last = self.last_class.lock();
        if *last == Some(network) {
            self.memo.put(key, url);
        } else {
            trace!(url = %url, network = %network, "Network class changed mid-resolve, not memoizing");
        }
    }

    /// Memoized resolutions were chosen for one network class; drop them
    /// when the class changes so the next pass picks up the new tier.
    fn observe_network(&self, network: NetworkClass) {
        let mut last = self.last_class.lock();
        if let Some(previous) = *last {
            if previous != network {
                debug!(from = %previous, to = %network, "Network class changed, clearing resolution memo");
                self.memo.clear();
            }
        }
        *last = Some(network);
    }

    pub fn memo(&self) -> &MemoCache {
        &self.memo
    }

    pub fn monitor(&self) -> &Arc<NetworkConditionMonitor> {
        &self.monitor
    }

    pub fn probe(&self) -> &Arc<CapabilityProbe> {
        &self.probe
    }
}

impl UrlResolver for ImageResolver {
    fn resolve_url(&self, reference: &ImageReference) -> Option<String> {
        match self.resolve(reference) {
            Resolution::Url(url) => Some(url),
            Resolution::Placeholder => None,
        }
    }
}

impl std::fmt::Debug for ImageResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageResolver")
            .field("memo", &self.memo)
            .field("last_class", &*self.last_class.lock())
            .finish()
    }
}

//! Image format capability negotiation.
//!
//! [`CapabilityProbe`] answers "can this client decode format X?" and
//! remembers the answer in a persisted [`CapabilityProfile`] so each format
//! is probed at most once per installation. How the answer is obtained is
//! a pluggable [`FormatProbe`] strategy:
//!
//! - [`AcceptHeaderProbe`]: content negotiation from the client's `Accept`
//!   header. Preferred whenever the transform endpoint sees the header.
//! - [`DecoderProbe`]: checks the local decoder registry.
//! - [`FixedProbe`]: pinned answers for tests and fixed deployments.
//!
//! A probe that errors records the format as unsupported, never unknown,
//! so transform selection always has a definite answer.

mod probe;
mod profile;
mod store;

pub use probe::{AcceptHeaderProbe, DecoderProbe, FixedProbe, FormatProbe, ProbeError};
pub use profile::{CapabilityProfile, ImageFormat, Support};
pub use store::ProfileStore;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

/// Lazily probes and persists format support.
pub struct CapabilityProbe {
    strategy: Arc<dyn FormatProbe>,
    store: Option<ProfileStore>,
    profile: RwLock<CapabilityProfile>,
}

impl CapabilityProbe {
    /// Create a probe backed by `strategy`.
    ///
    /// When a `store` is given, any previously persisted profile is loaded
    /// so formats resolved in an earlier session are not probed again.
    pub fn new(strategy: Arc<dyn FormatProbe>, store: Option<ProfileStore>) -> Self {
        let profile = store
            .as_ref()
            .map(|s| s.load_or_default())
            .unwrap_or_default();

        debug!(
            strategy = strategy.name(),
            avif = %profile.avif,
            webp = %profile.webp,
            "Capability profile loaded"
        );

        Self {
            strategy,
            store,
            profile: RwLock::new(profile),
        }
    }

    /// In-memory probe with no persistence.
    pub fn ephemeral(strategy: Arc<dyn FormatProbe>) -> Self {
        Self::new(strategy, None)
    }

    /// Whether the client can decode `format`, probing on first use.
    pub fn supports(&self, format: ImageFormat) -> bool {
        if let Some(known) = self.profile.read().support(format).as_bool() {
            return known;
        }

        let mut profile = self.profile.write();
        // Another caller may have probed while we waited for the lock.
        if let Some(known) = profile.support(format).as_bool() {
            return known;
        }

        let supported = match self.strategy.probe(format) {
            Ok(supported) => supported,
            Err(e) => {
                warn!(format = %format, error = %e, "Capability probe failed, assuming unsupported");
                false
            }
        };
        profile.record(format, supported);
        info!(format = %format, supported, strategy = self.strategy.name(), "Format probed");

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&profile) {
                warn!(path = %store.path().display(), error = %e, "Failed to persist capability profile");
            }
        }

        supported
    }

    /// Resolve every probe-able format now.
    ///
    /// Called once at startup so that render passes only ever read the
    /// profile.
    pub fn warm(&self) -> CapabilityProfile {
        for format in ImageFormat::PROBED {
            self.supports(format);
        }
        self.profile()
    }

    /// Snapshot of the current profile.
    pub fn profile(&self) -> CapabilityProfile {
        self.profile.read().clone()
    }
}

impl std::fmt::Debug for CapabilityProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityProbe")
            .field("strategy", &self.strategy.name())
            .field("profile", &*self.profile.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe that counts invocations and optionally fails.
    struct CountingProbe {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FormatProbe for CountingProbe {
        fn name(&self) -> &str {
            "counting"
        }

        fn probe(&self, _format: ImageFormat) -> Result<bool, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProbeError::Unavailable("test surface missing".to_string()))
            } else {
                Ok(true)
            }
        }
    }

    #[test]
    fn test_probes_each_format_once() {
        let strategy = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let probe = CapabilityProbe::ephemeral(strategy.clone());

        assert!(probe.supports(ImageFormat::Avif));
        assert!(probe.supports(ImageFormat::Avif));
        assert!(probe.supports(ImageFormat::WebP));
        assert!(probe.supports(ImageFormat::WebP));

        assert_eq!(strategy.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_probe_failure_records_unsupported() {
        let strategy = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let probe = CapabilityProbe::ephemeral(strategy.clone());

        assert!(!probe.supports(ImageFormat::Avif));
        assert_eq!(probe.profile().avif, Support::Unsupported);

        // Failure is sticky: no re-probe.
        assert!(!probe.supports(ImageFormat::Avif));
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_baseline_format_never_probed() {
        let strategy = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let probe = CapabilityProbe::ephemeral(strategy.clone());

        assert!(probe.supports(ImageFormat::Jpeg));
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_warm_resolves_all_probed_formats() {
        let probe = CapabilityProbe::ephemeral(Arc::new(FixedProbe::new(false, true)));
        let profile = probe.warm();

        assert_eq!(profile.avif, Support::Unsupported);
        assert_eq!(profile.webp, Support::Supported);
        assert!(profile.probed_at_secs.is_some());
    }

    #[test]
    fn test_persisted_profile_skips_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capabilities.json");

        let first = CapabilityProbe::new(
            Arc::new(FixedProbe::new(true, true)),
            Some(ProfileStore::new(path.clone())),
        );
        first.warm();

        let strategy = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let second = CapabilityProbe::new(strategy.clone(), Some(ProfileStore::new(path)));

        assert!(second.supports(ImageFormat::Avif));
        assert!(second.supports(ImageFormat::WebP));
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 0);
    }
}

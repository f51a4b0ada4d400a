//! Transform selection.
//!
//! [`TransformPolicy::resolve`] maps `(role, capabilities, network class)`
//! to a [`TransformSpec`] through a fixed priority table. It is a pure
//! function: no clock, no I/O, no hidden state, so the same triple always
//! yields the same spec and the result can be memoized by the caller.
//!
//! # Priority table
//!
//! ```text
//! role            offline               slow                  fast
//! ─────────────── ───────────────────── ───────────────────── ─────────────────────────────
//! primary         webp  q30  w320       webp  q30  w320       webp  q45  w480
//! secondary/tert. webp  q30  w320       webp  q30  w320       avif q60 w480 | webp q75 w480
//! standard        pref  q30  w320       avif q60 | webp q75 | jpg q85, w800 (slow and fast)
//! ```
//!
//! `pref` is the standard format preference (avif, then webp, then jpg),
//! so an offline client is never handed a format it cannot decode.

mod endpoint;

pub use endpoint::{TransformUrlBuilder, UrlError};

use serde::{Deserialize, Serialize};

use crate::capability::{CapabilityProfile, ImageFormat};
use crate::catalog::Role;
use crate::network::NetworkClass;

/// Quality tiers, lowest first.
pub mod quality {
    pub const LOWEST: u8 = 30;
    pub const LOW: u8 = 45;
    pub const MEDIUM: u8 = 60;
    pub const HIGH: u8 = 75;
    pub const VERY_HIGH: u8 = 85;
}

/// Target widths in pixels.
pub mod width {
    /// Constrained links and offline clients.
    pub const SMALLEST: u32 = 320;
    /// Above-the-fold tiles on a fast link.
    pub const CRITICAL: u32 = 480;
    /// Below-the-fold grid tiles.
    pub const STANDARD: u32 = 800;
}

/// Concrete transform request: format, quality and target width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformSpec {
    pub format: ImageFormat,
    /// Encoder quality, 1..=100.
    pub quality: u8,
    pub width_px: u32,
}

impl TransformSpec {
    /// Create a spec, clamping quality into 1..=100.
    pub fn new(format: ImageFormat, quality: u8, width_px: u32) -> Self {
        Self {
            format,
            quality: quality.clamp(1, 100),
            width_px,
        }
    }

    /// Query parameters in the order the transform endpoint expects.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("format", self.format.as_param().to_string()),
            ("quality", self.quality.to_string()),
            ("width", self.width_px.to_string()),
            ("strip", "true".to_string()),
        ];
        if self.format.is_baseline() {
            pairs.push(("progressive", "true".to_string()));
        }
        pairs
    }
}

/// The transform priority table.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransformPolicy;

impl TransformPolicy {
    /// Select the transform for one image.
    pub fn resolve(
        role: Role,
        capabilities: &CapabilityProfile,
        network: NetworkClass,
    ) -> TransformSpec {
        let lowest_tier = |format| TransformSpec::new(format, quality::LOWEST, width::SMALLEST);

        match (role, network) {
            (Role::Standard, NetworkClass::Offline) => {
                lowest_tier(Self::standard_spec(capabilities).format)
            }
            (Role::Standard, _) => Self::standard_spec(capabilities),
            (_, NetworkClass::Offline | NetworkClass::Slow) => lowest_tier(ImageFormat::WebP),
            (Role::PrimaryCritical, NetworkClass::Fast) => {
                TransformSpec::new(ImageFormat::WebP, quality::LOW, width::CRITICAL)
            }
            (_, NetworkClass::Fast) => {
                if capabilities.supports(ImageFormat::Avif) {
                    TransformSpec::new(ImageFormat::Avif, quality::MEDIUM, width::CRITICAL)
                } else {
                    TransformSpec::new(ImageFormat::WebP, quality::HIGH, width::CRITICAL)
                }
            }
        }
    }

    fn standard_spec(capabilities: &CapabilityProfile) -> TransformSpec {
        if capabilities.supports(ImageFormat::Avif) {
            TransformSpec::new(ImageFormat::Avif, quality::MEDIUM, width::STANDARD)
        } else if capabilities.supports(ImageFormat::WebP) {
            TransformSpec::new(ImageFormat::WebP, quality::HIGH, width::STANDARD)
        } else {
            TransformSpec::new(ImageFormat::Jpeg, quality::VERY_HIGH, width::STANDARD)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Support;
    use proptest::prelude::*;

    const ROLES: [Role; 4] = [
        Role::PrimaryCritical,
        Role::SecondaryCritical,
        Role::TertiaryCritical,
        Role::Standard,
    ];

    fn profile(avif: Support, webp: Support) -> CapabilityProfile {
        CapabilityProfile {
            avif,
            webp,
            probed_at_secs: None,
        }
    }

    fn support_strategy() -> impl Strategy<Value = Support> {
        prop_oneof![
            Just(Support::Unknown),
            Just(Support::Supported),
            Just(Support::Unsupported),
        ]
    }

    fn network_strategy() -> impl Strategy<Value = NetworkClass> {
        prop_oneof![
            Just(NetworkClass::Offline),
            Just(NetworkClass::Slow),
            Just(NetworkClass::Fast),
        ]
    }

    #[test]
    fn test_primary_critical_slow_uses_lowest_tier() {
        let caps = CapabilityProfile::with_support(false, true);
        let spec = TransformPolicy::resolve(Role::PrimaryCritical, &caps, NetworkClass::Slow);

        assert_eq!(spec.format, ImageFormat::WebP);
        assert_eq!(spec.quality, quality::LOWEST);
        assert_eq!(spec.width_px, width::SMALLEST);
    }

    #[test]
    fn test_primary_critical_fast_is_low_not_max() {
        let caps = CapabilityProfile::with_support(true, true);
        let spec = TransformPolicy::resolve(Role::PrimaryCritical, &caps, NetworkClass::Fast);

        assert_eq!(spec.format, ImageFormat::WebP);
        assert_eq!(spec.quality, quality::LOW);
        assert_eq!(spec.width_px, width::CRITICAL);
    }

    #[test]
    fn test_standard_fast_prefers_modern_format() {
        let caps = profile(Support::Supported, Support::Unknown);
        let spec = TransformPolicy::resolve(Role::Standard, &caps, NetworkClass::Fast);

        assert_eq!(spec.format, ImageFormat::Avif);
        assert_eq!(spec.quality, quality::MEDIUM);
        assert_eq!(spec.width_px, width::STANDARD);
    }

    #[test]
    fn test_standard_falls_back_through_formats() {
        let webp_only = CapabilityProfile::with_support(false, true);
        let spec = TransformPolicy::resolve(Role::Standard, &webp_only, NetworkClass::Fast);
        assert_eq!((spec.format, spec.quality), (ImageFormat::WebP, quality::HIGH));

        let neither = CapabilityProfile::with_support(false, false);
        let spec = TransformPolicy::resolve(Role::Standard, &neither, NetworkClass::Fast);
        assert_eq!((spec.format, spec.quality), (ImageFormat::Jpeg, quality::VERY_HIGH));
    }

    #[test]
    fn test_secondary_fast_depends_on_avif() {
        let with_avif = CapabilityProfile::with_support(true, true);
        let spec = TransformPolicy::resolve(Role::SecondaryCritical, &with_avif, NetworkClass::Fast);
        assert_eq!(spec, TransformSpec::new(ImageFormat::Avif, quality::MEDIUM, width::CRITICAL));

        let without = CapabilityProfile::with_support(false, true);
        let spec = TransformPolicy::resolve(Role::TertiaryCritical, &without, NetworkClass::Fast);
        assert_eq!(spec, TransformSpec::new(ImageFormat::WebP, quality::HIGH, width::CRITICAL));
    }

    #[test]
    fn test_secondary_slow_mirrors_primary() {
        let caps = CapabilityProfile::with_support(true, true);
        assert_eq!(
            TransformPolicy::resolve(Role::SecondaryCritical, &caps, NetworkClass::Slow),
            TransformPolicy::resolve(Role::PrimaryCritical, &caps, NetworkClass::Slow),
        );
    }

    #[test]
    fn test_critical_widths_smaller_than_standard() {
        let caps = CapabilityProfile::with_support(true, true);
        for network in [NetworkClass::Slow, NetworkClass::Fast] {
            let standard = TransformPolicy::resolve(Role::Standard, &caps, network);
            for role in &ROLES[..3] {
                let critical = TransformPolicy::resolve(*role, &caps, network);
                assert!(critical.width_px < standard.width_px);
            }
        }
    }

    #[test]
    fn test_baseline_format_adds_progressive() {
        let spec = TransformSpec::new(ImageFormat::Jpeg, 85, 800);
        let pairs = spec.query_pairs();
        assert_eq!(pairs.last(), Some(&("progressive", "true".to_string())));

        let spec = TransformSpec::new(ImageFormat::WebP, 75, 800);
        assert!(spec.query_pairs().iter().all(|(k, _)| *k != "progressive"));
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(TransformSpec::new(ImageFormat::Jpeg, 0, 10).quality, 1);
        assert_eq!(TransformSpec::new(ImageFormat::Jpeg, 250, 10).quality, 100);
    }

    proptest! {
        #[test]
        fn prop_resolve_is_deterministic(
            role_index in 0usize..4,
            avif in support_strategy(),
            webp in support_strategy(),
            network in network_strategy(),
        ) {
            let caps = profile(avif, webp);
            let first = TransformPolicy::resolve(ROLES[role_index], &caps, network);
            let second = TransformPolicy::resolve(ROLES[role_index], &caps, network);
            prop_assert_eq!(first, second);
            prop_assert!((1..=100).contains(&first.quality));
        }

        #[test]
        fn prop_offline_is_smallest_and_lowest(
            role_index in 0usize..4,
            avif in support_strategy(),
            webp in support_strategy(),
        ) {
            let caps = profile(avif, webp);
            let spec = TransformPolicy::resolve(ROLES[role_index], &caps, NetworkClass::Offline);
            prop_assert_eq!(spec.width_px, width::SMALLEST);
            prop_assert_eq!(spec.quality, quality::LOWEST);
        }

        #[test]
        fn prop_standard_never_requests_unsupported_format(
            avif in support_strategy(),
            webp in support_strategy(),
            network in network_strategy(),
        ) {
            let caps = profile(avif, webp);
            let spec = TransformPolicy::resolve(Role::Standard, &caps, network);
            prop_assert!(caps.supports(spec.format));
        }
    }
}

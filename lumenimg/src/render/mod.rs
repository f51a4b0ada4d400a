//! Render adapter.
//!
//! The seam between the resolution core and the UI layer. It turns a
//! [`Resolution`] and a [`Role`] into an [`ImageTile`]: the image source
//! plus loading and priority hints for the renderer. It holds no caching
//! logic beyond remembering which URLs produced undecodable bytes.

mod placeholder;
mod validate;

pub use placeholder::Placeholder;
pub use validate::{validate_payload, DecodeFailure, PayloadInfo};

use std::fmt;

use dashmap::DashMap;
use tracing::{trace, warn};

use crate::catalog::Role;

/// Outcome of resolving one image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The transformed URL to request.
    Url(String),
    /// No usable URL; render a placeholder.
    Placeholder,
}

impl Resolution {
    pub fn url(&self) -> Option<&str> {
        match self {
            Resolution::Url(url) => Some(url),
            Resolution::Placeholder => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Resolution::Placeholder)
    }
}

/// When the renderer should start loading an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingMode {
    Eager,
    Lazy,
}

impl LoadingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadingMode::Eager => "eager",
            LoadingMode::Lazy => "lazy",
        }
    }
}

/// How the renderer should prioritize the image fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityHint {
    High,
    Normal,
}

impl PriorityHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityHint::High => "high",
            PriorityHint::Normal => "normal",
        }
    }
}

/// Viewport state reported by the renderer's intersection observer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    /// No intersection signal received.
    #[default]
    Unobserved,
    /// The tile intersects the viewport.
    Intersecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderHints {
    pub loading: LoadingMode,
    pub priority: PriorityHint,
}

impl fmt::Display for RenderHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loading={} fetchpriority={}",
            self.loading.as_str(),
            self.priority.as_str()
        )
    }
}

/// Renderer-ready description of one product image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTile {
    /// Image source: the resolved URL or a placeholder data URI.
    pub src: String,
    /// Alternative text.
    pub alt: String,
    pub hints: RenderHints,
    pub is_placeholder: bool,
}

/// Builds image tiles and tracks payloads that failed to decode.
#[derive(Debug, Default)]
pub struct ImageRenderAdapter {
    failed: DashMap<String, DecodeFailure>,
}

impl ImageRenderAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loading and priority hints for a role.
    pub fn hints(role: Role, visibility: Visibility) -> RenderHints {
        if role.is_critical() || visibility == Visibility::Intersecting {
            RenderHints {
                loading: LoadingMode::Eager,
                priority: if role.is_critical() {
                    PriorityHint::High
                } else {
                    PriorityHint::Normal
                },
            }
        } else {
            RenderHints {
                loading: LoadingMode::Lazy,
                priority: PriorityHint::Normal,
            }
        }
    }

    /// Build the tile for one product image.
    ///
    /// URLs whose payload previously failed to decode are not retried; they
    /// render as a placeholder.
    pub fn tile(
        &self,
        label: &str,
        resolution: &Resolution,
        role: Role,
        visibility: Visibility,
    ) -> ImageTile {
        let hints = Self::hints(role, visibility);
        match resolution.url().filter(|url| !self.failed.contains_key(*url)) {
            Some(url) => ImageTile {
                src: url.to_string(),
                alt: label.to_string(),
                hints,
                is_placeholder: false,
            },
            None => {
                trace!(label = %label, role = %role, "Rendering placeholder");
                ImageTile {
                    src: Placeholder::new(label).to_data_uri(),
                    alt: label.to_string(),
                    hints,
                    is_placeholder: true,
                }
            }
        }
    }

    /// Validate fetched bytes for `url`, remembering a failure.
    pub fn check_payload(&self, url: &str, bytes: &[u8]) -> Result<PayloadInfo, DecodeFailure> {
        if let Some(failure) = self.failed.get(url) {
            return Err(failure.clone());
        }
        validate_payload(bytes).inspect_err(|failure| {
            warn!(url = %url, error = %failure, "Undecodable image payload, using placeholder");
            self.failed.insert(url.to_string(), failure.clone());
        })
    }

    /// Whether `url` is known to produce undecodable bytes.
    pub fn has_failed(&self, url: &str) -> bool {
        self.failed.contains_key(url)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::validate::tests::png_bytes;
    use super::*;

    const URL: &str = "https://cdn.test/lamp.jpg?format=avif&quality=60&width=800&strip=true";

    #[test]
    fn test_critical_roles_are_eager_high() {
        for role in [
            Role::PrimaryCritical,
            Role::SecondaryCritical,
            Role::TertiaryCritical,
        ] {
            for visibility in [Visibility::Unobserved, Visibility::Intersecting] {
                let hints = ImageRenderAdapter::hints(role, visibility);
                assert_eq!(hints.loading, LoadingMode::Eager);
                assert_eq!(hints.priority, PriorityHint::High);
            }
        }
    }

    #[test]
    fn test_standard_role_is_lazy_until_visible() {
        let hidden = ImageRenderAdapter::hints(Role::Standard, Visibility::Unobserved);
        assert_eq!(hidden.loading, LoadingMode::Lazy);
        assert_eq!(hidden.priority, PriorityHint::Normal);

        let visible = ImageRenderAdapter::hints(Role::Standard, Visibility::Intersecting);
        assert_eq!(visible.loading, LoadingMode::Eager);
        assert_eq!(visible.priority, PriorityHint::Normal);
    }

    #[test]
    fn test_tile_for_url() {
        let adapter = ImageRenderAdapter::new();
        let tile = adapter.tile(
            "Globe Pendant",
            &Resolution::Url(URL.to_string()),
            Role::PrimaryCritical,
            Visibility::Unobserved,
        );
        assert_eq!(tile.src, URL);
        assert_eq!(tile.alt, "Globe Pendant");
        assert!(!tile.is_placeholder);
        assert_eq!(tile.hints.to_string(), "loading=eager fetchpriority=high");
    }

    #[test]
    fn test_tile_for_placeholder() {
        let adapter = ImageRenderAdapter::new();
        let tile = adapter.tile(
            "Globe Pendant",
            &Resolution::Placeholder,
            Role::Standard,
            Visibility::Unobserved,
        );
        assert!(tile.is_placeholder);
        assert!(tile.src.starts_with("data:image/svg+xml,"));
        assert!(tile.src.contains("Globe Pendant"));
    }

    #[test]
    fn test_decode_failure_swaps_to_placeholder_without_retry() {
        let adapter = ImageRenderAdapter::new();
        let result = adapter.check_payload(URL, b"not an image");
        assert_eq!(result, Err(DecodeFailure::UnknownFormat));
        assert!(adapter.has_failed(URL));

        // Even valid bytes are not re-validated for a URL that already failed.
        assert!(adapter.check_payload(URL, &png_bytes(2, 2)).is_err());

        let tile = adapter.tile(
            "Desk Lamp",
            &Resolution::Url(URL.to_string()),
            Role::Standard,
            Visibility::Intersecting,
        );
        assert!(tile.is_placeholder);
        assert_eq!(adapter.failed_count(), 1);
    }

    #[test]
    fn test_valid_payload_is_accepted() {
        let adapter = ImageRenderAdapter::new();
        let info = adapter.check_payload(URL, &png_bytes(3, 5)).unwrap();
        assert_eq!(info.dimensions, Some((3, 5)));
        assert!(!adapter.has_failed(URL));
    }

    #[test]
    fn test_resolution_accessors() {
        assert_eq!(Resolution::Url("u".into()).url(), Some("u"));
        assert!(Resolution::Placeholder.is_placeholder());
    }
}

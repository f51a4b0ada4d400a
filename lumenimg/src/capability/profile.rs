//! Capability profile data types.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Encoded image formats the transform endpoint can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Modern efficient format.
    Avif,
    /// Legacy efficient format.
    WebP,
    /// Baseline fallback, decodable everywhere.
    Jpeg,
}

impl ImageFormat {
    /// Formats whose support has to be probed.
    pub const PROBED: [ImageFormat; 2] = [ImageFormat::Avif, ImageFormat::WebP];

    /// Value of the `format` query parameter.
    pub fn as_param(&self) -> &'static str {
        match self {
            ImageFormat::Avif => "avif",
            ImageFormat::WebP => "webp",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// MIME type, as it appears in `Accept` headers.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Avif => "image/avif",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// Returns true for the universally decodable fallback.
    pub fn is_baseline(&self) -> bool {
        matches!(self, ImageFormat::Jpeg)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_param())
    }
}

/// Tri-state support flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Support {
    #[default]
    Unknown,
    Supported,
    Unsupported,
}

impl Support {
    /// `Some` once resolved.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Support::Unknown => None,
            Support::Supported => Some(true),
            Support::Unsupported => Some(false),
        }
    }

    /// Only a positive probe counts; unknown is treated as unsupported.
    pub fn is_supported(&self) -> bool {
        matches!(self, Support::Supported)
    }
}

impl From<bool> for Support {
    fn from(value: bool) -> Self {
        if value {
            Support::Supported
        } else {
            Support::Unsupported
        }
    }
}

impl fmt::Display for Support {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Support::Unknown => "unknown",
            Support::Supported => "supported",
            Support::Unsupported => "unsupported",
        };
        write!(f, "{}", s)
    }
}

/// Persisted record of which formats the client decodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityProfile {
    /// Modern format support.
    #[serde(default)]
    pub avif: Support,
    /// Legacy efficient format support.
    #[serde(default)]
    pub webp: Support,
    /// When the most recent probe ran (seconds since UNIX_EPOCH).
    #[serde(default)]
    pub probed_at_secs: Option<u64>,
}

impl CapabilityProfile {
    /// Profile with both probed formats resolved.
    pub fn with_support(avif: bool, webp: bool) -> Self {
        Self {
            avif: avif.into(),
            webp: webp.into(),
            probed_at_secs: None,
        }
    }

    /// Support state for a format. The baseline is always supported.
    pub fn support(&self, format: ImageFormat) -> Support {
        match format {
            ImageFormat::Avif => self.avif,
            ImageFormat::WebP => self.webp,
            ImageFormat::Jpeg => Support::Supported,
        }
    }

    /// Whether `format` may be requested.
    pub fn supports(&self, format: ImageFormat) -> bool {
        self.support(format).is_supported()
    }

    /// Store a probe result and stamp the profile.
    pub fn record(&mut self, format: ImageFormat, supported: bool) {
        match format {
            ImageFormat::Avif => self.avif = supported.into(),
            ImageFormat::WebP => self.webp = supported.into(),
            ImageFormat::Jpeg => return,
        }
        self.probed_at_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs());
    }

    /// True when no probe-able format is still unknown.
    pub fn is_complete(&self) -> bool {
        ImageFormat::PROBED
            .iter()
            .all(|f| self.support(*f) != Support::Unknown)
    }
}

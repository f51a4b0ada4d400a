//! Pluggable format-probe strategies.

use thiserror::Error;

use super::profile::ImageFormat;

/// Errors raised while probing for a format.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// The strategy has nothing to go on in this environment.
    #[error("probe unavailable: {0}")]
    Unavailable(String),

    /// The feature test itself failed.
    #[error("probe for {format} failed: {reason}")]
    Failed { format: ImageFormat, reason: String },
}

/// A single way of finding out whether a format decodes.
pub trait FormatProbe: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &str;

    /// Run the feature test for `format`.
    fn probe(&self, format: ImageFormat) -> Result<bool, ProbeError>;
}

/// Checks the local decoder registry of the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecoderProbe;

impl FormatProbe for DecoderProbe {
    fn name(&self) -> &str {
        "decoder"
    }

    fn probe(&self, format: ImageFormat) -> Result<bool, ProbeError> {
        let decoder_format = match format {
            ImageFormat::Avif => image::ImageFormat::Avif,
            ImageFormat::WebP => image::ImageFormat::WebP,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        };
        Ok(decoder_format.reading_enabled())
    }
}

/// Content negotiation from an HTTP `Accept` header.
///
/// Only explicit MIME types count: a bare `*/*` or `image/*` says nothing
/// about modern formats, so it is treated as "not supported".
#[derive(Debug, Clone, Default)]
pub struct AcceptHeaderProbe {
    accepted: Option<Vec<String>>,
}

impl AcceptHeaderProbe {
    /// Build from the raw header value, if the request carried one.
    pub fn new(header: Option<&str>) -> Self {
        let accepted = header.map(|h| {
            h.split(',')
                .filter_map(|part| {
                    let mut params = part.split(';');
                    let mime = params.next()?.trim().to_ascii_lowercase();
                    // q=0 means "explicitly not acceptable".
                    let refused = params
                        .filter_map(|p| p.trim().strip_prefix("q="))
                        .any(|q| q.trim().parse::<f32>().map(|q| q <= 0.0).unwrap_or(false));
                    (!mime.is_empty() && !refused).then_some(mime)
                })
                .collect()
        });
        Self { accepted }
    }
}

impl FormatProbe for AcceptHeaderProbe {
    fn name(&self) -> &str {
        "accept-header"
    }

    fn probe(&self, format: ImageFormat) -> Result<bool, ProbeError> {
        let accepted = self
            .accepted
            .as_ref()
            .ok_or_else(|| ProbeError::Unavailable("request carried no Accept header".to_string()))?;
        Ok(accepted.iter().any(|m| m == format.mime_type()))
    }
}

/// Fixed answers.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe {
    avif: bool,
    webp: bool,
}

impl FixedProbe {
    pub fn new(avif: bool, webp: bool) -> Self {
        Self { avif, webp }
    }
}

impl FormatProbe for FixedProbe {
    fn name(&self) -> &str {
        "fixed"
    }

    fn probe(&self, format: ImageFormat) -> Result<bool, ProbeError> {
        Ok(match format {
            ImageFormat::Avif => self.avif,
            ImageFormat::WebP => self.webp,
            ImageFormat::Jpeg => true,
        })
    }
}

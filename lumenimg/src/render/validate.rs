//! Payload validation.
//!
//! Checks that fetched bytes are an image before they are handed to the
//! renderer. The format is sniffed from magic bytes; formats the `image`
//! crate can decode also have their header parsed for dimensions.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};
use thiserror::Error;

/// Fetched bytes are not a usable image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeFailure {
    #[error("payload is empty")]
    Empty,

    #[error("unrecognized image format")]
    UnknownFormat,

    #[error("malformed {format} payload: {reason}")]
    Malformed { format: String, reason: String },

    #[error("{format} image has zero size")]
    ZeroSize { format: String },
}

/// What validation learned about a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadInfo {
    pub format: ImageFormat,
    /// Pixel dimensions, when the format's header could be read.
    pub dimensions: Option<(u32, u32)>,
}

/// Validate an image payload.
pub fn validate_payload(bytes: &[u8]) -> Result<PayloadInfo, DecodeFailure> {
    if bytes.is_empty() {
        return Err(DecodeFailure::Empty);
    }

    let format = image::guess_format(bytes).map_err(|_| DecodeFailure::UnknownFormat)?;
    let name = || format!("{:?}", format);

    if !format.reading_enabled() {
        return Ok(PayloadInfo {
            format,
            dimensions: None,
        });
    }

    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| DecodeFailure::Malformed {
            format: name(),
            reason: e.to_string(),
        })?;
    if width == 0 || height == 0 {
        return Err(DecodeFailure::ZeroSize { format: name() });
    }

    Ok(PayloadInfo {
        format,
        dimensions: Some((width, height)),
    })
}

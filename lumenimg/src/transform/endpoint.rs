//! Transform-endpoint URL construction.
//!
//! A resolved URL is the original asset URL with the transform parameters
//! appended. Any transform parameters already present are replaced rather
//! than duplicated, so resolving an already-resolved URL is stable.

use thiserror::Error;
use url::Url;

use super::TransformSpec;

/// Query keys owned by the transform endpoint.
const TRANSFORM_KEYS: [&str; 5] = ["format", "quality", "width", "strip", "progressive"];

/// Reasons a raw URL cannot be transformed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("empty image URL")]
    Empty,

    #[error("unparsable image URL {url:?}: {reason}")]
    Unparsable { url: String, reason: String },

    #[error("unsupported URL scheme {0:?}")]
    UnsupportedScheme(String),
}

/// Builds resolved URLs, optionally joining relative catalog paths onto
/// an asset host.
#[derive(Debug, Clone, Default)]
pub struct TransformUrlBuilder {
    base: Option<Url>,
}

impl TransformUrlBuilder {
    /// Builder accepting only absolute URLs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder resolving relative paths against `base`.
    pub fn with_base(base: Url) -> Self {
        Self { base: Some(base) }
    }

    /// Validate a raw URL without building anything.
    ///
    /// Callers use this to short-circuit to a placeholder before any
    /// transform is selected.
    pub fn parse(&self, raw_url: &str) -> Result<Url, UrlError> {
        let raw = raw_url.trim();
        if raw.is_empty() {
            return Err(UrlError::Empty);
        }

        let parsed = match &self.base {
            Some(base) => base.join(raw),
            None => Url::parse(raw),
        }
        .map_err(|e| UrlError::Unparsable {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(UrlError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Append `spec` to an already-parsed asset URL.
    pub fn apply(&self, mut asset: Url, spec: &TransformSpec) -> String {
        let kept: Vec<(String, String)> = asset
            .query_pairs()
            .filter(|(k, _)| !TRANSFORM_KEYS.iter().any(|key| *key == *k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        {
            let mut query = asset.query_pairs_mut();
            query.clear();
            for (k, v) in &kept {
                query.append_pair(k, v);
            }
            for (k, v) in spec.query_pairs() {
                query.append_pair(k, &v);
            }
        }

        asset.into()
    }

    /// Parse `raw_url` and append `spec`.
    pub fn build(&self, raw_url: &str, spec: &TransformSpec) -> Result<String, UrlError> {
        let asset = self.parse(raw_url)?;
        Ok(self.apply(asset, spec))
    }
}

//! reqwest-backed fetcher.

use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use super::{BlobFetcher, FetchError};
use crate::store::BoxFuture;

/// Default upper bound for a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Fetches transformed images over HTTP.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestFetcher {
    /// Creates a fetcher with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT, None)
    }

    /// Creates a fetcher with a custom timeout and optional user agent.
    pub fn with_timeout(timeout: Duration, user_agent: Option<&str>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent.to_string());
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

impl BlobFetcher for ReqwestFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'_, Result<Bytes, FetchError>> {
        let url = url.to_string();
        Box::pin(async move {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| self.map_error(&url, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url,
                    status: status.as_u16(),
                });
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| self.map_error(&url, e))?;
            trace!(url = %url, bytes = body.len(), "Fetched image");
            Ok(body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_timeout() {
        let fetcher = ReqwestFetcher::new().unwrap();
        assert_eq!(fetcher.timeout(), DEFAULT_FETCH_TIMEOUT);
    }

    #[test]
    fn test_custom_timeout() {
        let fetcher =
            ReqwestFetcher::with_timeout(Duration::from_millis(250), Some("lumenimg-test")).unwrap();
        assert_eq!(fetcher.timeout(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_soft_error() {
        let fetcher = ReqwestFetcher::with_timeout(Duration::from_millis(500), None).unwrap();
        // Port 9 (discard) on localhost is closed in test environments.
        let result = fetcher.fetch("http://127.0.0.1:9/nothing.jpg").await;
        assert!(result.is_err());
    }
}

//! Byte-source abstraction for the preloader.
//!
//! The preloader drives buffering through [`MediaFetcher`] so the state
//! machine can be exercised in tests with scripted fetchers. The production
//! implementation is plain HTTP range requests over a shared reqwest client.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header;
use reqwest::Client;

use clipstream_common::{Error, Result};

/// What the metadata phase learns about a source.
#[derive(Debug, Clone)]
pub struct SourceMetadata {
    pub total_bytes: u64,
    pub content_type: Option<String>,
}

/// A source of media bytes addressable by URL and byte range.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch size and content type without buffering media data.
    async fn metadata(&self, url: &str) -> Result<SourceMetadata>;

    /// Fetch exactly `length` bytes starting at `start` (short reads only at
    /// end of file).
    async fn fetch_range(&self, url: &str, start: u64, length: u64) -> Result<Bytes>;
}

/// HTTP range-request fetcher.
pub struct HttpMediaFetcher {
    client: Client,
}

impl HttpMediaFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpMediaFetcher {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn metadata(&self, url: &str) -> Result<SourceMetadata> {
        // A one-byte range GET instead of HEAD: several backends answer HEAD
        // with bogus lengths, but Content-Range on a 206 is reliable.
        let response = self
            .client
            .get(url)
            .header(header::RANGE, "bytes=0-0")
            .send()
            .await
            .map_err(|e| Error::upstream(1, format!("{url}: {e}")))?;

        let status = response.status();
        if !(status.is_success() || status == reqwest::StatusCode::PARTIAL_CONTENT) {
            return Err(Error::upstream(1, format!("{url}: status {status}")));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let total_bytes = if status == reqwest::StatusCode::PARTIAL_CONTENT {
            response
                .headers()
                .get(header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range_total)
        } else {
            response.content_length()
        }
        .ok_or_else(|| Error::upstream(1, format!("{url}: no usable length")))?;

        Ok(SourceMetadata {
            total_bytes,
            content_type,
        })
    }

    async fn fetch_range(&self, url: &str, start: u64, length: u64) -> Result<Bytes> {
        let end = start + length.saturating_sub(1);
        let response = self
            .client
            .get(url)
            .header(header::RANGE, format!("bytes={start}-{end}"))
            .send()
            .await
            .map_err(|e| Error::upstream(1, format!("{url}: {e}")))?;

        let status = response.status();
        if !(status.is_success() || status == reqwest::StatusCode::PARTIAL_CONTENT) {
            return Err(Error::upstream(1, format!("{url}: status {status}")));
        }

        response
            .bytes()
            .await
            .map_err(|e| Error::upstream(1, format!("{url}: {e}")))
    }
}

/// Pull the total size out of `bytes START-END/TOTAL`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

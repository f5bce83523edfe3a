//! Fallback probing for the consumer file-hosting backend.
//!
//! The stored file id has no reliably fetchable URL: depending on host, load
//! and mood, the service answers with the real bytes, an HTTP error, or a
//! 200 HTML interstitial ("this file is popular, confirm you are human").
//! The prober expands the locator into an ordered list of candidate URLs and
//! accepts the first one that answers with genuinely playable bytes.
//!
//! Probing is strictly sequential. The service rate-limits per file, so two
//! candidate URLs for the same asset must never be in flight at once.

use std::time::Duration;

use reqwest::header;
use reqwest::Client;

use clipstream_common::{Error, Result};

use crate::config::FileShareConfig;

/// A candidate URL that survived probing.
#[derive(Debug, Clone)]
pub struct ProbedUrl {
    pub url: String,
    /// Which template produced it, for diagnostics.
    pub template: &'static str,
}

/// Probes file-share candidate URLs in order until one proves playable.
pub struct FallbackProber {
    client: Client,
    config: FileShareConfig,
}

impl FallbackProber {
    pub fn new(config: FileShareConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self { client, config }
    }

    /// Candidate URL templates for a file id, in probe order.
    fn candidates(&self, file_id: &str, saved_url: Option<&str>) -> Vec<(&'static str, String)> {
        let host = origin(&self.config.host);
        let alt = origin(&self.config.alt_host);

        let mut list = vec![
            ("direct-download", format!("{host}/d/{file_id}")),
            ("alt-host-download", format!("{alt}/d/{file_id}")),
            (
                "legacy-download",
                format!("{host}/file/{file_id}?download=1"),
            ),
        ];
        if let Some(url) = saved_url {
            list.push(("saved-url", url.to_string()));
        }
        list.push(("preview", format!("{host}/preview/{file_id}")));
        list
    }

    /// Probe candidates sequentially and return the first playable URL.
    ///
    /// A candidate is accepted only when the upstream answers success or
    /// partial-content AND the declared content type is not `text/html`.
    /// The incoming Range header, when present, is passed through so the
    /// probe exercises the same request shape playback will use.
    pub async fn probe(
        &self,
        file_id: &str,
        saved_url: Option<&str>,
        range: Option<&str>,
    ) -> Result<ProbedUrl> {
        let candidates = self.candidates(file_id, saved_url);
        let mut last_error = String::from("no candidates");
        let mut attempts = 0usize;

        for (template, url) in candidates {
            attempts += 1;

            let request = self
                .client
                .get(&url)
                .header(header::USER_AGENT, &self.config.user_agent)
                .header(header::RANGE, range.unwrap_or("bytes=0-"));

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(template, %url, error = %e, "Probe request failed");
                    last_error = format!("{template}: {e}");
                    continue;
                }
            };

            let status = response.status();
            if !(status.is_success() || status == reqwest::StatusCode::PARTIAL_CONTENT) {
                tracing::debug!(template, %url, %status, "Probe rejected by status");
                last_error = format!("{template}: status {status}");
                continue;
            }

            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");

            // A 200 HTML page is the interstitial/warning failure mode, not
            // a playable file.
            if content_type.starts_with("text/html") {
                tracing::debug!(template, %url, "Probe rejected: HTML interstitial");
                last_error = format!("{template}: interstitial HTML response");
                continue;
            }

            tracing::info!(
                template,
                %url,
                attempts,
                content_type,
                "Probe accepted candidate"
            );
            return Ok(ProbedUrl { url, template });
        }

        Err(Error::upstream(attempts, last_error))
    }

    /// The user agent probe requests are sent with, for reuse by the proxy
    /// when it fetches the accepted URL.
    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }
}

/// Hosts are configured bare (`share.example.com`) or as a full origin
/// (`http://127.0.0.1:9000` in tests); bare hosts get https.
fn origin(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

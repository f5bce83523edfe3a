//! Shared delivery helpers: range parsing, content-type mapping, conditional
//! local-file serving, and upstream proxying with streamed bodies.
//!
//! Bodies are never buffered whole. Local files go through `ReaderStream`
//! over a bounded `Take`; upstream responses are piped chunk-by-chunk from
//! the reqwest byte stream into the response body.

use axum::body::Body;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use clipstream_common::{Error, Result, VideoId};

/// Read granularity for local-file streaming.
const STREAM_CHUNK_BYTES: usize = 64 * 1024;

/// Cache lifetime for proxied local files.
const LOCAL_CACHE_CONTROL: &str = "public, max-age=3600";

/// A parsed `Range` header, before clamping against the file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=START-` or `bytes=START-END`.
    FromTo(u64, Option<u64>),
    /// `bytes=-N`: the last N bytes.
    Suffix(u64),
}

/// Parse a `Range: bytes=...` header value.
///
/// Malformed values are an explicit error, not a silent full-file response:
/// a client that mangles its seek math should hear about it.
pub fn parse_range_header(value: &str) -> Result<ByteRange> {
    let malformed = || Error::RangeUnsatisfiable(value.to_string());

    let raw = value.strip_prefix("bytes=").ok_or_else(malformed)?;
    let (start_str, end_str) = raw.split_once('-').ok_or_else(malformed)?;
    let start_str = start_str.trim();
    let end_str = end_str.trim();

    match (start_str.is_empty(), end_str.is_empty()) {
        // bytes=-500
        (true, false) => {
            let suffix: u64 = end_str.parse().map_err(|_| malformed())?;
            if suffix == 0 {
                return Err(malformed());
            }
            Ok(ByteRange::Suffix(suffix))
        }
        // bytes=500-
        (false, true) => {
            let start: u64 = start_str.parse().map_err(|_| malformed())?;
            Ok(ByteRange::FromTo(start, None))
        }
        // bytes=0-499
        (false, false) => {
            let start: u64 = start_str.parse().map_err(|_| malformed())?;
            let end: u64 = end_str.parse().map_err(|_| malformed())?;
            Ok(ByteRange::FromTo(start, Some(end)))
        }
        // bytes=-
        (true, true) => Err(malformed()),
    }
}

/// Clamp a parsed range against the actual size.
///
/// Returns the inclusive `(start, end)` byte span, or `None` when the range
/// cannot be satisfied (start beyond EOF, inverted bounds).
pub fn resolve_range(range: ByteRange, size: u64) -> Option<(u64, u64)> {
    if size == 0 {
        return None;
    }
    match range {
        ByteRange::Suffix(len) => {
            let start = size.saturating_sub(len);
            Some((start, size - 1))
        }
        ByteRange::FromTo(start, end) => {
            if start >= size {
                return None;
            }
            let end = end.unwrap_or(size - 1).min(size - 1);
            if start > end {
                return None;
            }
            Some((start, end))
        }
    }
}

/// Content type from the file extension. Unknown extensions default to mp4 —
/// short-video uploads are overwhelmingly that, and players sniff anyway.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "webm" => "video/webm",
        "ogg" | "ogv" => "video/ogg",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        _ => "video/mp4",
    }
}

/// Validator for a local file delivery: changes whenever the file or the
/// requested output dimensions change.
pub fn local_etag(video_id: VideoId, mtime_ms: i64, size: u64, width: u32, height: u32) -> String {
    format!("{video_id}-{mtime_ms}-{size}-{width}x{height}")
}

fn http_date(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn range_not_satisfiable(size: u64) -> Response {
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [(header::CONTENT_RANGE.as_str(), format!("bytes */{size}"))],
        Body::empty(),
    )
        .into_response()
}

/// Serve a local media file with range and conditional-request support.
///
/// `dims` are the requested output dimensions; they participate in the ETag
/// so differently-sized deliveries never share a validator.
pub async fn serve_local_file(
    path: &Path,
    video_id: VideoId,
    dims: (u32, u32),
    headers: &HeaderMap,
) -> Result<Response> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| Error::LocalFileMissing(path.display().to_string()))?;

    let size = metadata.len();
    let modified: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());
    let mtime_ms = modified.timestamp_millis();

    let etag = local_etag(video_id, mtime_ms, size, dims.0, dims.1);
    let last_modified = http_date(modified);

    if is_unmodified(headers, &etag, modified) {
        return Ok(Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::ETAG, &etag)
            .header(header::LAST_MODIFIED, &last_modified)
            .header(header::CACHE_CONTROL, LOCAL_CACHE_CONTROL)
            .body(Body::empty())
            .map_err(|e| Error::internal(format!("response build failed: {e}")))?);
    }

    let content_type = content_type_for_path(path);

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(parse_range_header)
        .transpose()?;

    match range {
        Some(range) => {
            let Some((start, end)) = resolve_range(range, size) else {
                return Ok(range_not_satisfiable(size));
            };
            let length = end - start + 1;

            let mut file = tokio::fs::File::open(path)
                .await
                .map_err(|_| Error::LocalFileMissing(path.display().to_string()))?;
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(|e| Error::internal(format!("seek failed: {e}")))?;

            // Take bounds the read to exactly the requested span.
            let stream = ReaderStream::with_capacity(file.take(length), STREAM_CHUNK_BYTES);

            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, length.to_string())
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {start}-{end}/{size}"),
                )
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::ETAG, &etag)
                .header(header::LAST_MODIFIED, &last_modified)
                .header(header::CACHE_CONTROL, LOCAL_CACHE_CONTROL)
                .body(Body::from_stream(stream))
                .map_err(|e| Error::internal(format!("response build failed: {e}")))
        }
        None => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|_| Error::LocalFileMissing(path.display().to_string()))?;

            let stream = ReaderStream::with_capacity(file, STREAM_CHUNK_BYTES);

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, size.to_string())
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::ETAG, &etag)
                .header(header::LAST_MODIFIED, &last_modified)
                .header(header::CACHE_CONTROL, LOCAL_CACHE_CONTROL)
                .body(Body::from_stream(stream))
                .map_err(|e| Error::internal(format!("response build failed: {e}")))
        }
    }
}

/// Whether the client's validators match the current file state.
fn is_unmodified(headers: &HeaderMap, etag: &str, modified: DateTime<Utc>) -> bool {
    if let Some(candidates) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    {
        return candidates
            .split(',')
            .map(|c| c.trim().trim_matches('"'))
            .any(|c| c == etag || c == "*");
    }

    if let Some(since) = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
    {
        // HTTP dates have second precision; truncate before comparing.
        return modified.timestamp() <= since.timestamp();
    }

    false
}

/// Proxy an upstream URL, forwarding the incoming Range verbatim and
/// mirroring status and entity headers back to the client.
async fn try_proxy(
    client: &reqwest::Client,
    url: &str,
    range: Option<&str>,
    user_agent: Option<&str>,
) -> std::result::Result<Response, String> {
    let mut request = client.get(url);
    if let Some(range) = range {
        request = request.header(reqwest::header::RANGE, range);
    }
    if let Some(ua) = user_agent {
        request = request.header(reqwest::header::USER_AGENT, ua);
    }

    let upstream = request.send().await.map_err(|e| format!("{url}: {e}"))?;

    let status = upstream.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(format!("{url}: status {status}"));
    }

    let mut builder = Response::builder()
        .status(StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK))
        .header(header::ACCEPT_RANGES, "bytes");

    for name in [
        reqwest::header::CONTENT_TYPE,
        reqwest::header::CONTENT_LENGTH,
        reqwest::header::CONTENT_RANGE,
    ] {
        if let Some(value) = upstream.headers().get(&name) {
            if let Ok(value) = value.to_str() {
                builder = builder.header(name.as_str(), value);
            }
        }
    }

    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| format!("response build failed: {e}"))
}

/// Proxy `primary`, falling back exactly once to `fallback` when the primary
/// fetch fails. The error carries how many attempts were made and the last
/// failure observed.
pub async fn proxy_with_fallback(
    client: &reqwest::Client,
    primary: &str,
    fallback: Option<&str>,
    range: Option<&str>,
    user_agent: Option<&str>,
) -> Result<Response> {
    match try_proxy(client, primary, range, user_agent).await {
        Ok(response) => Ok(response),
        Err(primary_err) => {
            let Some(fallback) = fallback else {
                return Err(Error::upstream(1, primary_err));
            };
            tracing::warn!(
                error = %primary_err,
                fallback,
                "Primary upstream fetch failed; trying stored URL once"
            );
            try_proxy(client, fallback, range, user_agent)
                .await
                .map_err(|fallback_err| Error::upstream(2, fallback_err))
        }
    }
}

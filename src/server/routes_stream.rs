//! The streaming endpoint: `GET /stream/{video_id}?w&h&q`.
//!
//! Resolution decides between two delivery modes. Public backends get a 302
//! to their own URL (the cheap path). Private, file-share, and local sources
//! are proxied: the server fetches or reads the bytes itself and streams
//! them through with full range support.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use serde::Deserialize;

use clipstream_common::{Error, ResolvedSource, StorageKind, VideoId};

use super::error::AppError;
use super::streaming_helpers::{proxy_with_fallback, serve_local_file};
use super::AppContext;
use crate::resolve::TransformParams;

/// Redirect cache lifetime for immutable managed-CDN assets.
const CDN_REDIRECT_CACHE: &str = "public, max-age=31536000, immutable";
/// Redirect cache lifetime for third-party-hosted derived URLs.
const TRANSFORM_REDIRECT_CACHE: &str = "public, max-age=3600";

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub w: Option<u32>,
    pub h: Option<u32>,
    pub q: Option<String>,
}

/// GET /stream/:video_id
pub async fn stream_video(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let video_id: VideoId = video_id
        .parse()
        .map_err(|_| Error::validation("Invalid video id"))?;

    let descriptor = ctx
        .catalog
        .get(&video_id)
        .ok_or_else(|| Error::not_found("video", video_id))?;

    let params = TransformParams::with_overrides(
        &ctx.config.transform,
        query.w,
        query.h,
        query.q.clone(),
    );

    // Resolved fresh per request; signed URLs are short-lived.
    let source = ctx.resolver.resolve_with(&descriptor, &params)?;

    if !source.content_kind.requires_proxy() {
        return Ok(redirect_to(&source)?);
    }

    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    let response = match source.storage_kind {
        StorageKind::LocalFile => {
            // Catalog paths are relative; refuse anything that climbs out
            // of the media root.
            let rel = std::path::Path::new(&source.primary_url);
            if rel.is_absolute()
                || rel
                    .components()
                    .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                return Err(Error::validation("Invalid media path").into());
            }
            let path = ctx.config.media.root.join(rel);
            serve_local_file(&path, video_id, (params.width, params.height), &headers).await?
        }

        StorageKind::CloudTransformPrivate => {
            proxy_with_fallback(
                &ctx.http,
                &source.primary_url,
                source.fallback_url.as_deref(),
                range,
                None,
            )
            .await?
        }

        StorageKind::FileShare => {
            // The locator is expanded into candidate URLs now, not at
            // resolution time: the winning URL is only valid for moments.
            let probed = ctx
                .prober
                .probe(&source.primary_url, source.fallback_url.as_deref(), range)
                .await?;
            proxy_with_fallback(
                &ctx.http,
                &probed.url,
                None,
                range,
                Some(ctx.prober.user_agent()),
            )
            .await?
        }

        kind => {
            return Err(Error::internal(format!(
                "storage kind {kind} resolved to proxy delivery"
            ))
            .into())
        }
    };

    Ok(response)
}

fn redirect_to(source: &ResolvedSource) -> Result<Response, AppError> {
    let cache_control = match source.storage_kind {
        StorageKind::ManagedCdn => CDN_REDIRECT_CACHE,
        _ => TRANSFORM_REDIRECT_CACHE,
    };

    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, &source.primary_url)
        .header(header::CACHE_CONTROL, cache_control)
        .body(Body::empty())
        .map_err(|e| AppError::new(Error::internal(format!("response build failed: {e}"))))
}

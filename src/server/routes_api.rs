//! Resolution API consumed by the client-side preloader.
//!
//! `GET /api/videos/{id}/source` gives the feed one entry point for "where
//! do I point the player". Redirect-kind sources hand back their public URL
//! directly; proxy-kind sources hand back the streaming endpoint path so
//! signed private URLs never leave the server.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use clipstream_common::{ContentKind, Error, StorageKind, VideoId};

use super::error::AppError;
use super::AppContext;

#[derive(Debug, Serialize)]
pub struct VideoSourceResponse {
    pub video_id: VideoId,
    pub storage_kind: StorageKind,
    pub content_kind: ContentKind,
    /// What the player should load: a public backend URL, or this server's
    /// streaming endpoint for proxied kinds.
    pub url: String,
}

/// GET /api/videos/:video_id/source
pub async fn get_video_source(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
) -> Result<Json<VideoSourceResponse>, AppError> {
    let video_id: VideoId = video_id
        .parse()
        .map_err(|_| Error::validation("Invalid video id"))?;

    let descriptor = ctx
        .catalog
        .get(&video_id)
        .ok_or_else(|| Error::not_found("video", video_id))?;

    let source = ctx.resolver.resolve(&descriptor)?;

    let url = if source.content_kind.requires_proxy() {
        format!("/stream/{video_id}")
    } else {
        source.primary_url.clone()
    };

    Ok(Json(VideoSourceResponse {
        video_id,
        storage_kind: source.storage_kind,
        content_kind: source.content_kind,
        url,
    }))
}

/// GET /api/videos
pub async fn list_videos(State(ctx): State<AppContext>) -> Json<Vec<VideoId>> {
    Json(ctx.catalog.video_ids())
}

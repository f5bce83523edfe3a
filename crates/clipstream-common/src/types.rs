//! Storage-backend data model.
//!
//! A video's bytes may live in several places at once: a managed video CDN,
//! a cloud media-transform service, a consumer file host, or the local disk.
//! Each copy is recorded as an explicit tagged [`BackendRef`] — the kind is
//! decided when the reference is written, never guessed from which fields
//! happen to be populated. A [`BackendDescriptor`] may carry references from
//! more than one kind at a time (migration leftovers); resolution picks one
//! by strict priority and never blends fields across kinds.

use serde::{Deserialize, Serialize};

use crate::ids::VideoId;

/// A single backend reference: where one copy of the video lives and how to
/// address it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BackendRef {
    /// Managed video-CDN pipeline with ready-made playback URLs.
    ManagedCdn {
        /// Opaque asset id assigned by the CDN.
        asset_id: String,
        /// Playlist or MP4 URL, directly playable.
        playback_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail_url: Option<String>,
    },
    /// Generic cloud media-transform service addressed by public id.
    CloudTransform {
        /// Public id of the uploaded asset.
        public_id: String,
        /// Account base URL transformations are injected into.
        base_url: String,
        /// Private assets need server-side signing and must never be exposed
        /// as a redirect.
        #[serde(default)]
        private: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail_url: Option<String>,
    },
    /// Consumer file-hosting service; the file id has no reliable direct URL
    /// and must be probed at request time.
    FileShare {
        /// Opaque file id on the hosting service.
        file_id: String,
        /// Download URL observed when the file was stored, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        saved_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail_url: Option<String>,
    },
    /// File on the local filesystem, relative to the configured media root.
    LocalFile {
        /// Relative path under the media root.
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail_url: Option<String>,
    },
}

impl BackendRef {
    /// The storage-kind label this reference resolves under.
    pub fn storage_kind(&self) -> StorageKind {
        match self {
            BackendRef::ManagedCdn { .. } => StorageKind::ManagedCdn,
            BackendRef::CloudTransform { private: false, .. } => StorageKind::CloudTransformPublic,
            BackendRef::CloudTransform { private: true, .. } => StorageKind::CloudTransformPrivate,
            BackendRef::FileShare { .. } => StorageKind::FileShare,
            BackendRef::LocalFile { .. } => StorageKind::LocalFile,
        }
    }
}

/// Per-video record of which storage backends hold a copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// The video this descriptor belongs to.
    pub video_id: VideoId,
    /// Backend references, possibly from more than one kind (migration
    /// artifact). Order in this list carries no meaning; resolution applies
    /// its own priority.
    #[serde(default)]
    pub refs: Vec<BackendRef>,
}

impl BackendDescriptor {
    /// Build a descriptor from a single reference.
    pub fn single(video_id: VideoId, backend: BackendRef) -> Self {
        Self {
            video_id,
            refs: vec![backend],
        }
    }

    /// Whether the descriptor carries no backend reference at all.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Which storage backend a resolution landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageKind {
    ManagedCdn,
    CloudTransformPublic,
    CloudTransformPrivate,
    FileShare,
    LocalFile,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StorageKind::ManagedCdn => "managed-cdn",
            StorageKind::CloudTransformPublic => "cloud-transform-public",
            StorageKind::CloudTransformPrivate => "cloud-transform-private",
            StorageKind::FileShare => "file-share",
            StorageKind::LocalFile => "local-file",
        };
        f.write_str(s)
    }
}

/// How a resolved source must be delivered to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Progressive MP4, playable via redirect.
    Mp4,
    /// HLS playlist, playable via redirect.
    Hls,
    /// Generic redirect to a derived URL.
    Redirect,
    /// The server itself fetches/reads the bytes and streams them through.
    Proxy,
}

impl ContentKind {
    /// Whether delivery goes through the server-side byte proxy rather than
    /// a 302 to the backend.
    pub fn requires_proxy(&self) -> bool {
        matches!(self, ContentKind::Proxy)
    }
}

/// The outcome of source resolution: a URL plus how it must be delivered.
///
/// Produced fresh per request and never cached beyond one HTTP response —
/// backends hand out short-lived signed URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedSource {
    pub storage_kind: StorageKind,
    pub content_kind: ContentKind,
    /// Primary delivery URL. For file-share sources this is the locator the
    /// prober expands at request time, not a fetchable URL.
    pub primary_url: String,
    /// Secondary URL tried exactly once if the primary fetch fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,
}

/// How aggressively a preload candidate should be buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadPriority {
    /// Fetch source metadata only.
    Metadata,
    /// Buffer a bounded prefix ahead of playback.
    Partial,
    /// Buffer essentially the whole asset.
    Full,
}

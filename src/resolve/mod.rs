//! Source resolution.
//!
//! [`SourceResolver::resolve`] turns a [`BackendDescriptor`] into a
//! [`ResolvedSource`]: which backend wins, what URL to use, and whether the
//! bytes are delivered by redirect or through the server-side proxy.
//!
//! Priority order, highest first: managed-cdn → cloud-transform (public) →
//! cloud-transform (private) → file-share → local-file. A descriptor may
//! carry stale references from several kinds at once; exactly one reference
//! is selected and only its fields are read.

mod prober;
mod transform;

pub use prober::{FallbackProber, ProbedUrl};
pub use transform::{
    public_delivery_url, raw_delivery_url, signed_delivery_url, TransformParams,
};

use clipstream_common::{
    BackendDescriptor, BackendRef, ContentKind, Error, ResolvedSource, Result, StorageKind,
};

use crate::config::{CloudTransformConfig, TransformConfig};

/// Resolves backend descriptors into deliverable sources.
pub struct SourceResolver {
    transform: TransformConfig,
    credentials: CloudTransformConfig,
}

impl SourceResolver {
    pub fn new(transform: TransformConfig, credentials: CloudTransformConfig) -> Self {
        Self {
            transform,
            credentials,
        }
    }

    /// Resolve with the configured default transformation parameters.
    pub fn resolve(&self, descriptor: &BackendDescriptor) -> Result<ResolvedSource> {
        self.resolve_with(descriptor, &TransformParams::from(&self.transform))
    }

    /// Resolve with explicit transformation parameters (per-request quality
    /// overrides from the streaming endpoint).
    pub fn resolve_with(
        &self,
        descriptor: &BackendDescriptor,
        params: &TransformParams,
    ) -> Result<ResolvedSource> {
        let backend = select_backend(descriptor)
            .ok_or_else(|| Error::SourceNotAvailable(descriptor.video_id.to_string()))?;

        let source = match backend {
            BackendRef::ManagedCdn { playback_url, .. } => {
                let content_kind = if playback_url.ends_with(".m3u8") {
                    ContentKind::Hls
                } else {
                    ContentKind::Mp4
                };
                ResolvedSource {
                    storage_kind: StorageKind::ManagedCdn,
                    content_kind,
                    primary_url: playback_url.clone(),
                    fallback_url: None,
                }
            }

            BackendRef::CloudTransform {
                public_id,
                base_url,
                private: false,
                ..
            } => ResolvedSource {
                storage_kind: StorageKind::CloudTransformPublic,
                content_kind: ContentKind::Redirect,
                primary_url: public_delivery_url(base_url, public_id, params),
                fallback_url: None,
            },

            BackendRef::CloudTransform {
                public_id,
                base_url,
                private: true,
                ..
            } => {
                // The signed URL stays server-side: it must never be handed
                // out as a redirect where it becomes cacheable/shareable.
                let secret = self.credentials.api_secret.as_deref().ok_or_else(|| {
                    Error::ConfigurationMissing("cloud_transform.api_secret".into())
                })?;
                ResolvedSource {
                    storage_kind: StorageKind::CloudTransformPrivate,
                    content_kind: ContentKind::Proxy,
                    primary_url: signed_delivery_url(base_url, public_id, params, secret),
                    fallback_url: Some(raw_delivery_url(base_url, public_id, &params.format)),
                }
            }

            BackendRef::FileShare {
                file_id, saved_url, ..
            } => ResolvedSource {
                storage_kind: StorageKind::FileShare,
                content_kind: ContentKind::Proxy,
                // The locator is not reliably fetchable; the prober expands
                // it into candidate URLs at request time.
                primary_url: file_id.clone(),
                fallback_url: saved_url.clone(),
            },

            BackendRef::LocalFile { path, .. } => ResolvedSource {
                storage_kind: StorageKind::LocalFile,
                content_kind: ContentKind::Proxy,
                primary_url: path.clone(),
                fallback_url: None,
            },
        };

        tracing::debug!(
            video_id = %descriptor.video_id,
            storage_kind = %source.storage_kind,
            "Resolved source"
        );

        Ok(source)
    }
}

/// Pick the highest-priority backend reference present on the descriptor.
fn select_backend(descriptor: &BackendDescriptor) -> Option<&BackendRef> {
    let by_kind = |kind: StorageKind| {
        descriptor
            .refs
            .iter()
            .find(move |r| r.storage_kind() == kind)
    };

    by_kind(StorageKind::ManagedCdn)
        .or_else(|| by_kind(StorageKind::CloudTransformPublic))
        .or_else(|| by_kind(StorageKind::CloudTransformPrivate))
        .or_else(|| by_kind(StorageKind::FileShare))
        .or_else(|| by_kind(StorageKind::LocalFile))
}

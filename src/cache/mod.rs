//! Persistent byte cache: coordinator half.
//!
//! The page-facing [`CacheCoordinator`] talks to the background
//! [`CacheWorker`](worker::CacheWorker) over a narrow message protocol.
//! Entries are keyed by resolved URL, not video id — a video resolves to
//! different signed URLs across requests, and a miss after URL rotation is
//! normal, not an error.
//!
//! Every coordinator call is best-effort: when the worker is unavailable
//! (feature disabled, worker exited) calls degrade to no-ops instead of
//! failing the caller.

mod worker;

pub use worker::CacheWorker;

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};

use clipstream_common::{PreloadPriority, VideoId};

/// Requests understood by the cache worker.
#[derive(Debug)]
pub enum CacheRequest {
    /// Opportunistically fetch and persist a source in the background.
    PreloadVideo {
        url: String,
        priority: PreloadPriority,
        video_id: VideoId,
    },
    /// Look up a cached entry by resolved URL.
    Lookup {
        url: String,
        reply: oneshot::Sender<Option<CachedMedia>>,
    },
    /// Wipe all cached bytes; the reply lets the caller await completion
    /// before reloading.
    ClearCache { reply: oneshot::Sender<ClearedCache> },
}

/// A cache hit.
#[derive(Debug, Clone)]
pub struct CachedMedia {
    pub path: PathBuf,
    pub total_bytes: u64,
}

/// Acknowledgement for a completed wipe.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearedCache {
    pub entries_removed: usize,
    pub bytes_removed: u64,
}

/// Page-side handle to the cache worker.
#[derive(Clone)]
pub struct CacheCoordinator {
    tx: Option<mpsc::Sender<CacheRequest>>,
}

impl CacheCoordinator {
    /// Coordinator with no worker behind it; every call is a no-op.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Coordinator backed by an explicit request channel. Embedding
    /// applications with their own worker implementation enter here.
    pub fn new(tx: mpsc::Sender<CacheRequest>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Whether a worker is (or was) attached.
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Request background caching of a source. Fire-and-forget.
    pub async fn preload_video(&self, url: &str, priority: PreloadPriority, video_id: VideoId) {
        let Some(tx) = &self.tx else { return };
        let request = CacheRequest::PreloadVideo {
            url: url.to_string(),
            priority,
            video_id,
        };
        if tx.send(request).await.is_err() {
            tracing::debug!("Cache worker gone; preload request dropped");
        }
    }

    /// Look up a cached entry. `None` on miss or when the worker is absent.
    pub async fn lookup(&self, url: &str) -> Option<CachedMedia> {
        let tx = self.tx.as_ref()?;
        let (reply, rx) = oneshot::channel();
        tx.send(CacheRequest::Lookup {
            url: url.to_string(),
            reply,
        })
        .await
        .ok()?;
        rx.await.ok().flatten()
    }

    /// Wipe the cache and wait for the worker's acknowledgement.
    ///
    /// `None` when the worker is absent — the caller proceeds as if the
    /// cache were already empty.
    pub async fn clear_cache(&self) -> Option<ClearedCache> {
        let tx = self.tx.as_ref()?;
        let (reply, rx) = oneshot::channel();
        tx.send(CacheRequest::ClearCache { reply }).await.ok()?;
        rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_coordinator_is_all_noops() {
        let coordinator = CacheCoordinator::disabled();
        assert!(!coordinator.is_enabled());

        coordinator
            .preload_video("https://x.example.com/a.mp4", PreloadPriority::Full, VideoId::new())
            .await;
        assert!(coordinator.lookup("https://x.example.com/a.mp4").await.is_none());
        assert!(coordinator.clear_cache().await.is_none());
    }

    #[tokio::test]
    async fn dead_worker_degrades_to_noops() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let coordinator = CacheCoordinator::new(tx);

        // Worker is gone; calls must not hang or panic.
        coordinator
            .preload_video("https://x.example.com/a.mp4", PreloadPriority::Partial, VideoId::new())
            .await;
        assert!(coordinator.lookup("https://x.example.com/a.mp4").await.is_none());
        assert!(coordinator.clear_cache().await.is_none());
    }
}

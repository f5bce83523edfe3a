//! Progressive preload.
//!
//! A preload task buffers a bounded prefix (or essentially all) of a
//! resolved source ahead of playback, so the next video in the feed starts
//! without a stall. Each task walks `idle → metadata → loading → ready |
//! error`; progress is sampled and emitted on a watch channel at most once
//! per throttle interval.
//!
//! At most one task exists per video id — re-adding a video replaces the old
//! task, firing its cancellation token. One task at a time holds the "hot"
//! slot and consumes bandwidth; the rest wait their turn.

mod fetcher;
mod session;

pub use fetcher::{HttpMediaFetcher, MediaFetcher, SourceMetadata};
pub use session::SessionContext;

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use dashmap::DashMap;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use clipstream_common::{PreloadPriority, VideoId};

use crate::cache::CacheCoordinator;
use crate::config::PreloadConfig;

/// Partial priority stops at this fraction of the duration...
const PARTIAL_FRACTION: f64 = 0.30;
/// ...or at this many buffered seconds, whichever comes first.
const PARTIAL_MAX_SECONDS: f64 = 10.0;
/// Full priority stops at this buffered fraction.
const FULL_FRACTION: f64 = 0.95;
/// Slack for comparing derived buffered seconds against a boundary.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Where a task is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadPhase {
    Idle,
    Metadata,
    Loading,
    Ready,
    Error,
}

/// Snapshot of a task's buffering state.
#[derive(Debug, Clone)]
pub struct PreloadProgress {
    pub phase: PreloadPhase,
    pub buffered_seconds: f64,
    pub total_seconds: f64,
}

/// A video that became a preload candidate (e.g. next in feed).
#[derive(Debug, Clone)]
pub struct PreloadCandidate {
    pub video_id: VideoId,
    /// Resolved playback URL.
    pub url: String,
    pub priority: PreloadPriority,
    /// Duration known from feed metadata; buffered seconds are derived from
    /// the byte fraction against this.
    pub total_seconds: f64,
}

/// Handle to an enqueued task.
pub struct PreloadHandle {
    pub video_id: VideoId,
    progress: watch::Receiver<PreloadProgress>,
    cancel: CancellationToken,
}

impl PreloadHandle {
    /// Subscribe to progress updates.
    pub fn progress(&self) -> watch::Receiver<PreloadProgress> {
        self.progress.clone()
    }

    /// Latest progress snapshot.
    pub fn snapshot(&self) -> PreloadProgress {
        self.progress.borrow().clone()
    }

    /// Whether this task's cancellation token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

struct ActiveTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns preload tasks and enforces replace-not-duplicate semantics.
pub struct PreloadManager {
    tasks: DashMap<VideoId, ActiveTask>,
    fetcher: Arc<dyn MediaFetcher>,
    cache: CacheCoordinator,
    session: Arc<SessionContext>,
    /// The single bandwidth-consuming slot.
    hot_slot: Arc<Semaphore>,
    chunk_bytes: u64,
    progress_interval: Duration,
}

impl PreloadManager {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        cache: CacheCoordinator,
        session: Arc<SessionContext>,
        config: &PreloadConfig,
    ) -> Self {
        Self {
            tasks: DashMap::new(),
            fetcher,
            cache,
            session,
            hot_slot: Arc::new(Semaphore::new(1)),
            chunk_bytes: config.chunk_bytes.max(1),
            progress_interval: Duration::from_millis(config.progress_interval_ms),
        }
    }

    /// Enqueue a preload candidate.
    ///
    /// An existing task for the same video id is cancelled and replaced —
    /// never mutated in place, never duplicated. Retry after an error goes
    /// through here too: abort the failed task, construct a fresh one.
    pub fn enqueue(&self, candidate: PreloadCandidate) -> PreloadHandle {
        let video_id = candidate.video_id;

        if let Some((_, old)) = self.tasks.remove(&video_id) {
            old.cancel.cancel();
            old.handle.abort();
            tracing::debug!(video_id = %video_id, "Replaced existing preload task");
        }

        let mut candidate = candidate;
        if self.session.data_saver() {
            candidate.priority = PreloadPriority::Metadata;
        }

        let (progress_tx, progress_rx) = watch::channel(PreloadProgress {
            phase: PreloadPhase::Idle,
            buffered_seconds: 0.0,
            total_seconds: candidate.total_seconds,
        });

        let cancel = CancellationToken::new();
        let task = TaskRun {
            candidate,
            fetcher: Arc::clone(&self.fetcher),
            cache: self.cache.clone(),
            hot_slot: Arc::clone(&self.hot_slot),
            chunk_bytes: self.chunk_bytes,
            progress_interval: self.progress_interval,
            progress: progress_tx,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.run());

        self.tasks.insert(video_id, ActiveTask {
            cancel: cancel.clone(),
            handle,
        });

        PreloadHandle {
            video_id,
            progress: progress_rx,
            cancel,
        }
    }

    /// Cancel and remove the task for a video, if any.
    pub fn cancel(&self, video_id: &VideoId) -> bool {
        match self.tasks.remove(video_id) {
            Some((_, task)) => {
                task.cancel.cancel();
                task.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every task (navigation away from the feed).
    pub fn cancel_all(&self) {
        let ids: Vec<VideoId> = self.tasks.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.cancel(&id);
        }
    }

    /// Wait for the task for a video to finish, removing it.
    pub async fn wait(&self, video_id: &VideoId) {
        if let Some((_, task)) = self.tasks.remove(video_id) {
            let _ = task.handle.await;
        }
    }

    /// Whether a live task exists for the video.
    pub fn active(&self, video_id: &VideoId) -> bool {
        self.tasks
            .get(video_id)
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Everything one task run owns.
struct TaskRun {
    candidate: PreloadCandidate,
    fetcher: Arc<dyn MediaFetcher>,
    cache: CacheCoordinator,
    hot_slot: Arc<Semaphore>,
    chunk_bytes: u64,
    progress_interval: Duration,
    progress: watch::Sender<PreloadProgress>,
    cancel: CancellationToken,
}

impl TaskRun {
    async fn run(self) {
        let TaskRun {
            candidate,
            fetcher,
            cache,
            hot_slot,
            chunk_bytes,
            progress_interval,
            progress,
            cancel,
        } = self;

        let total_seconds = candidate.total_seconds;
        let mut emitter = ProgressEmitter {
            progress: &progress,
            interval: progress_interval,
            last_emit: None,
            total_seconds,
        };

        // Queued tasks wait here; only the permit holder touches the network.
        let _permit = tokio::select! {
            _ = cancel.cancelled() => return,
            permit = hot_slot.acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => return,
            },
        };

        emitter.emit(PreloadPhase::Metadata, 0.0, true);

        let metadata = tokio::select! {
            _ = cancel.cancelled() => return,
            m = fetcher.metadata(&candidate.url) => m,
        };
        let metadata = match metadata {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(video_id = %candidate.video_id, error = %e, "Preload metadata failed");
                emitter.emit(PreloadPhase::Error, 0.0, true);
                return;
            }
        };

        if candidate.priority == PreloadPriority::Metadata {
            emitter.emit(PreloadPhase::Ready, 0.0, true);
            return;
        }

        // A persistent-cache hit means the bytes are already local; skip the
        // network entirely.
        if candidate.priority == PreloadPriority::Partial {
            let cached = tokio::select! {
                _ = cancel.cancelled() => return,
                c = cache.lookup(&candidate.url) => c,
            };
            if cached.is_some() {
                emitter.emit(PreloadPhase::Ready, total_seconds, true);
                return;
            }
        }

        emitter.emit(PreloadPhase::Loading, 0.0, true);

        let total_bytes = metadata.total_bytes;
        if total_bytes == 0 || total_seconds <= 0.0 {
            emitter.emit(PreloadPhase::Ready, 0.0, true);
            return;
        }

        let target_seconds = match candidate.priority {
            PreloadPriority::Partial => (PARTIAL_FRACTION * total_seconds).min(PARTIAL_MAX_SECONDS),
            PreloadPriority::Full => FULL_FRACTION * total_seconds,
            PreloadPriority::Metadata => unreachable!("handled above"),
        };

        // Models the media element's buffer: bytes are held for the task's
        // lifetime and dropped when it ends.
        let mut buffer = BytesMut::new();

        loop {
            let buffered_bytes = buffer.len() as u64;
            let remaining = total_bytes - buffered_bytes;
            if remaining == 0 {
                emitter.emit(PreloadPhase::Ready, total_seconds, true);
                return;
            }
            let length = chunk_bytes.min(remaining);

            let chunk = tokio::select! {
                _ = cancel.cancelled() => return,
                c = fetcher.fetch_range(&candidate.url, buffered_bytes, length) => c,
            };
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    tracing::debug!(video_id = %candidate.video_id, error = %e, "Preload fetch failed");
                    let buffered = buffered_seconds(buffered_bytes, total_bytes, total_seconds);
                    emitter.emit(PreloadPhase::Error, buffered, true);
                    return;
                }
            };

            if chunk.is_empty() {
                // Upstream ended early; whatever we have is all there is.
                let buffered = buffered_seconds(buffered_bytes, total_bytes, total_seconds);
                emitter.emit(PreloadPhase::Ready, buffered, true);
                return;
            }

            buffer.extend_from_slice(&chunk);

            let buffered = buffered_seconds(buffer.len() as u64, total_bytes, total_seconds);
            if buffered + BOUNDARY_EPSILON >= target_seconds {
                emitter.emit(PreloadPhase::Ready, buffered, true);
                return;
            }
            emitter.emit(PreloadPhase::Loading, buffered, false);
        }
    }
}

fn buffered_seconds(buffered_bytes: u64, total_bytes: u64, total_seconds: f64) -> f64 {
    total_seconds * (buffered_bytes as f64 / total_bytes as f64)
}

/// Sampled progress reporting: phase transitions always emit; loading
/// updates are dropped unless the throttle interval has elapsed.
struct ProgressEmitter<'a> {
    progress: &'a watch::Sender<PreloadProgress>,
    interval: Duration,
    last_emit: Option<Instant>,
    total_seconds: f64,
}

impl ProgressEmitter<'_> {
    fn emit(&mut self, phase: PreloadPhase, buffered_seconds: f64, force: bool) {
        let now = Instant::now();
        if !force {
            if let Some(last) = self.last_emit {
                if now.duration_since(last) < self.interval {
                    return;
                }
            }
        }
        self.last_emit = Some(now);
        let _ = self.progress.send(PreloadProgress {
            phase,
            buffered_seconds,
            total_seconds: self.total_seconds,
        });
    }
}

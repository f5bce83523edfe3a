//! Persistent byte cache: worker half.
//!
//! The worker owns a disk directory of cached media, an in-memory index, and
//! the message loop. Files are named by the SHA-256 of their source URL.
//! Bounded by `max_bytes` with oldest-access-first eviction; a periodic pass
//! drops entries unused past the TTL.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use clipstream_common::VideoId;

use super::{CacheCoordinator, CacheRequest, CachedMedia, ClearedCache};
use crate::config::CacheConfig;

/// How often the TTL cleanup pass runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Queue depth for coordinator requests.
const REQUEST_QUEUE: usize = 32;

struct IndexEntry {
    path: PathBuf,
    bytes: u64,
    last_accessed: Instant,
}

/// Background cache worker.
pub struct CacheWorker {
    dir: PathBuf,
    max_bytes: u64,
    ttl: Duration,
    client: reqwest::Client,
    index: HashMap<String, IndexEntry>,
    rx: mpsc::Receiver<CacheRequest>,
}

impl CacheWorker {
    /// Spawn the worker and return the page-side coordinator.
    ///
    /// Returns a disabled coordinator when the cache directory cannot be
    /// created — caching is opportunistic and never blocks startup.
    pub fn spawn(config: &CacheConfig) -> (CacheCoordinator, Option<tokio::task::JoinHandle<()>>) {
        if !config.enabled {
            return (CacheCoordinator::disabled(), None);
        }

        if let Err(e) = std::fs::create_dir_all(&config.dir) {
            tracing::warn!(
                dir = %config.dir.display(),
                error = %e,
                "Cache directory unavailable; caching disabled"
            );
            return (CacheCoordinator::disabled(), None);
        }

        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let mut worker = Self {
            dir: config.dir.clone(),
            max_bytes: config.max_bytes,
            ttl: Duration::from_secs(config.ttl_secs),
            client: reqwest::Client::new(),
            index: HashMap::new(),
            rx,
        };
        worker.load_existing();

        let handle = tokio::spawn(worker.run());
        (CacheCoordinator::new(tx), Some(handle))
    }

    /// Re-index files left over from a previous run.
    fn load_existing(&mut self) {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(key) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            self.index.insert(
                key.to_string(),
                IndexEntry {
                    path,
                    bytes: metadata.len(),
                    last_accessed: Instant::now(),
                },
            );
        }

        if !self.index.is_empty() {
            tracing::info!(entries = self.index.len(), "Re-indexed cached media");
        }
    }

    async fn run(mut self) {
        let mut cleanup = tokio::time::interval(CLEANUP_INTERVAL);
        cleanup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                request = self.rx.recv() => {
                    match request {
                        Some(request) => self.handle(request).await,
                        None => break,
                    }
                }
                _ = cleanup.tick() => self.cleanup_expired(),
            }
        }

        tracing::debug!("Cache worker stopped");
    }

    async fn handle(&mut self, request: CacheRequest) {
        match request {
            CacheRequest::PreloadVideo {
                url,
                priority,
                video_id,
            } => {
                tracing::debug!(video_id = %video_id, ?priority, "Cache preload requested");
                if let Err(e) = self.store(&url).await {
                    tracing::debug!(video_id = %video_id, error = %e, "Cache preload failed");
                }
            }
            CacheRequest::Lookup { url, reply } => {
                let _ = reply.send(self.lookup(&url));
            }
            CacheRequest::ClearCache { reply } => {
                let _ = reply.send(self.clear());
            }
        }
    }

    fn lookup(&mut self, url: &str) -> Option<CachedMedia> {
        let key = cache_key(url);
        let entry = self.index.get_mut(&key)?;
        entry.last_accessed = Instant::now();
        Some(CachedMedia {
            path: entry.path.clone(),
            total_bytes: entry.bytes,
        })
    }

    /// Fetch a source and persist it, streaming chunk-by-chunk to disk.
    async fn store(&mut self, url: &str) -> clipstream_common::Result<()> {
        let key = cache_key(url);
        if let Some(entry) = self.index.get_mut(&key) {
            entry.last_accessed = Instant::now();
            return Ok(());
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| clipstream_common::Error::upstream(1, format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(clipstream_common::Error::upstream(
                1,
                format!("{url}: status {}", response.status()),
            ));
        }

        let path = self.dir.join(&key);
        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    // Never leave a truncated entry behind.
                    drop(file);
                    let _ = tokio::fs::remove_file(&path).await;
                    return Err(clipstream_common::Error::upstream(
                        1,
                        format!("{url}: {e}"),
                    ));
                }
            };
            bytes += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        self.index.insert(
            key,
            IndexEntry {
                path,
                bytes,
                last_accessed: Instant::now(),
            },
        );
        self.evict_to_fit();

        tracing::debug!(url, bytes, "Cached media entry");
        Ok(())
    }

    fn total_bytes(&self) -> u64 {
        self.index.values().map(|e| e.bytes).sum()
    }

    /// Drop oldest-accessed entries until the store fits the byte budget.
    fn evict_to_fit(&mut self) {
        while self.total_bytes() > self.max_bytes && self.index.len() > 1 {
            let Some(oldest) = self
                .index
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            if let Some(entry) = self.index.remove(&oldest) {
                let _ = std::fs::remove_file(&entry.path);
                tracing::debug!(bytes = entry.bytes, "Evicted cache entry");
            }
        }
    }

    fn cleanup_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .index
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_accessed) >= self.ttl)
            .map(|(k, _)| k.clone())
            .collect();

        for key in expired {
            if let Some(entry) = self.index.remove(&key) {
                let _ = std::fs::remove_file(&entry.path);
            }
        }
    }

    fn clear(&mut self) -> ClearedCache {
        let mut cleared = ClearedCache::default();
        for (_, entry) in self.index.drain() {
            cleared.entries_removed += 1;
            cleared.bytes_removed += entry.bytes;
            let _ = std::fs::remove_file(&entry.path);
        }
        tracing::info!(
            entries = cleared.entries_removed,
            bytes = cleared.bytes_removed,
            "Cache cleared"
        );
        cleared
    }
}

fn cache_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

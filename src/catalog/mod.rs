//! Read-only backend-descriptor catalog.
//!
//! The subsystem consumes already-stored backend references and never mutates
//! them, so the catalog is a flat JSON map loaded once at startup. An
//! embedding application with its own persistence can construct the store
//! from descriptors directly instead of going through a file.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use parking_lot::RwLock;

use clipstream_common::{BackendDescriptor, VideoId};

/// In-memory store of per-video [`BackendDescriptor`]s.
pub struct DescriptorStore {
    descriptors: RwLock<HashMap<VideoId, BackendDescriptor>>,
}

impl DescriptorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    /// Build a store from a list of descriptors.
    ///
    /// Later entries for the same video id replace earlier ones.
    pub fn from_descriptors(descriptors: Vec<BackendDescriptor>) -> Self {
        let map = descriptors
            .into_iter()
            .map(|d| (d.video_id, d))
            .collect::<HashMap<_, _>>();
        Self {
            descriptors: RwLock::new(map),
        }
    }

    /// Load the catalog from a JSON file containing an array of descriptors.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {:?}", path))?;
        let descriptors: Vec<BackendDescriptor> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {:?}", path))?;

        tracing::info!(
            count = descriptors.len(),
            path = %path.display(),
            "Loaded descriptor catalog"
        );

        Ok(Self::from_descriptors(descriptors))
    }

    /// Load the catalog if the file exists, otherwise start empty.
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "No catalog file; starting empty");
            Ok(Self::new())
        }
    }

    /// Look up the descriptor for a video.
    pub fn get(&self, video_id: &VideoId) -> Option<BackendDescriptor> {
        self.descriptors.read().get(video_id).cloned()
    }

    /// All known video ids.
    pub fn video_ids(&self) -> Vec<VideoId> {
        self.descriptors.read().keys().copied().collect()
    }

    /// Insert or replace a descriptor. Used by embedding applications and
    /// tests; the HTTP surface never writes.
    pub fn insert(&self, descriptor: BackendDescriptor) {
        self.descriptors
            .write()
            .insert(descriptor.video_id, descriptor);
    }

    /// Number of descriptors in the store.
    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    /// Whether the store holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.descriptors.read().is_empty()
    }
}

impl Default for DescriptorStore {
    fn default() -> Self {
        Self::new()
    }
}

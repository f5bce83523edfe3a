//! Session-scoped playback flags.
//!
//! These used to be ambient global reads scattered across components; they
//! are now one explicit object handed to whoever needs it. Lifecycle: created
//! when the viewing session starts, [`reset`](SessionContext::reset) when the
//! user logs out.

use std::sync::atomic::{AtomicBool, Ordering};

/// Mutable per-session flags consulted by the preloader.
#[derive(Debug, Default)]
pub struct SessionContext {
    /// When set, preloading degrades to metadata-only so playback never
    /// competes with the user's bandwidth cap.
    data_saver: AtomicBool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_saver(&self) -> bool {
        self.data_saver.load(Ordering::Relaxed)
    }

    pub fn set_data_saver(&self, enabled: bool) {
        self.data_saver.store(enabled, Ordering::Relaxed);
    }

    /// Clear all flags back to their session-start defaults.
    pub fn reset(&self) {
        self.data_saver.store(false, Ordering::Relaxed);
    }
}

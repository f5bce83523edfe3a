//! Typed ID wrappers.
//!
//! Newtype over `Uuid` so a video identifier can't be confused with any other
//! string floating through the request path.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(Uuid);

impl VideoId {
    /// Generate a new random video ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for VideoId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<VideoId> for Uuid {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

impl std::str::FromStr for VideoId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Shared types for clipstream: typed ids, the unified error taxonomy, and
//! the storage-backend data model consumed by the resolver and proxy.

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::VideoId;
pub use types::{
    BackendDescriptor, BackendRef, ContentKind, PreloadPriority, ResolvedSource, StorageKind,
};

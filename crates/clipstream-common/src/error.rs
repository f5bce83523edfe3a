//! Unified error type for clipstream.
//!
//! All crates funnel their failures into [`Error`], which carries enough
//! context for the HTTP layer to derive a status code via
//! [`Error::http_status`]. Resolution and delivery failures are deliberately
//! distinct so operators can tell "asset broken" from "feature unconfigured".

use std::fmt;

/// Unified error type covering all failure modes in clipstream.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "video", "descriptor").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The descriptor carries no usable backend reference.
    #[error("no playable source for video {0}")]
    SourceNotAvailable(String),

    /// A local media file referenced by the catalog is missing from disk.
    #[error("local media file missing: {0}")]
    LocalFileMissing(String),

    /// Every upstream candidate failed, including any fallback attempt.
    #[error("upstream unreachable after {attempts} attempt(s): {last_error}")]
    UpstreamUnreachable {
        /// How many candidate URLs were tried before giving up.
        attempts: usize,
        /// The last observed failure, for diagnostics.
        last_error: String,
    },

    /// The client sent a Range header we refuse to serve.
    #[error("unsatisfiable range: {0}")]
    RangeUnsatisfiable(String),

    /// A backend needs credentials that are absent from the configuration.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(String),

    /// Request data failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::SourceNotAvailable(_) => 404,
            Error::LocalFileMissing(_) => 404,
            Error::UpstreamUnreachable { .. } => 502,
            Error::RangeUnsatisfiable(_) => 416,
            Error::ConfigurationMissing(_) => 503,
            Error::Validation(_) => 400,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::UpstreamUnreachable`].
    pub fn upstream(attempts: usize, last_error: impl Into<String>) -> Self {
        Error::UpstreamUnreachable {
            attempts,
            last_error: last_error.into(),
        }
    }

    /// Convenience constructor for [`Error::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Convenience constructor for [`Error::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

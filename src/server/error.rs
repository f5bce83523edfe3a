//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`clipstream_common::Error`] so that route
//! handlers can return `Result<T, AppError>` directly. Bodies are
//! machine-readable JSON; upstream failures additionally carry the attempt
//! count and last error for diagnostics.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use clipstream_common::Error;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: Error,
}

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self { inner }
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in stream handler"
            );
        }

        let code = match &self.inner {
            Error::NotFound { .. } => "not_found",
            Error::SourceNotAvailable(_) => "source_not_available",
            Error::LocalFileMissing(_) => "local_file_missing",
            Error::UpstreamUnreachable { .. } => "upstream_unreachable",
            Error::RangeUnsatisfiable(_) => "range_unsatisfiable",
            Error::ConfigurationMissing(_) => "configuration_missing",
            Error::Validation(_) => "validation_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        };

        let mut body = json!({
            "error": self.inner.to_string(),
            "code": code,
        });

        if let Error::UpstreamUnreachable {
            attempts,
            last_error,
        } = &self.inner
        {
            body["attempts"] = json!(attempts);
            body["last_error"] = json!(last_error);
        }

        (status, axum::Json(body)).into_response()
    }
}

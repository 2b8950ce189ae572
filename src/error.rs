use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// The attribute of an incoming file that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectedAttribute {
    Extension,
    MimeType,
    Size,
}

impl std::fmt::Display for RejectedAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectedAttribute::Extension => "extension",
            RejectedAttribute::MimeType => "mime type",
            RejectedAttribute::Size => "size",
        };
        f.write_str(s)
    }
}

/// Failures while persisting an upload to the local scratch directory.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("payload exceeds staging ceiling of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("staging write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by the remote object store, with provider detail attached.
#[derive(Debug, Error)]
#[error("{detail}")]
pub struct TransferError {
    pub detail: String,
}

impl TransferError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Failure to delete a staged file after the remote transfer resolved.
///
/// Never surfaced as the primary error of a request whose transfer
/// succeeded; it compounds into [`UploadError::TransferFailed`] otherwise.
#[derive(Debug, Error)]
#[error("failed to delete staged file {}: {source}", .path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Per-file outcome of the upload pipeline when it does not yield a
/// remote descriptor.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file present under field '{field}'")]
    NoFilePresent { field: String },

    #[error("{attribute} rejected: {reason}")]
    ValidationRejected {
        attribute: RejectedAttribute,
        reason: String,
    },

    #[error("staging failed: {0}")]
    StageFailed(#[from] StageError),

    #[error("remote transfer failed: {detail}")]
    TransferFailed {
        detail: String,
        /// Set when cleanup also failed and a staged copy was left behind.
        orphaned: Option<PathBuf>,
    },
}

impl UploadError {
    /// Machine-discriminable reason code used in response bodies.
    pub fn reason(&self) -> &'static str {
        match self {
            UploadError::NoFilePresent { .. } => "no_file_present",
            UploadError::ValidationRejected { .. } => "validation_rejected",
            UploadError::StageFailed(_) => "stage_failed",
            UploadError::TransferFailed { .. } => "transfer_failed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::NoFilePresent { .. } => StatusCode::BAD_REQUEST,
            UploadError::ValidationRejected {
                attribute: RejectedAttribute::Size,
                ..
            } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::ValidationRejected { .. } => StatusCode::BAD_REQUEST,
            UploadError::StageFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::TransferFailed { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Internal Server Error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, reason, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::Upload(err) => {
                if err.status().is_server_error() {
                    tracing::error!("upload pipeline failed: {err}");
                }
                (err.status(), err.reason(), err.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "reason": reason,
        }));

        (status, body).into_response()
    }
}

// error.rs - Error taxonomy for processing and the HTTP surface
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;

use crate::fetch::FetchError;
use crate::mailer::MailError;
use crate::scanner::ScanError;
use crate::storage::StorageError;

/// Failures raised by the transform pipeline, the scene detector and the probe.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Input file not found: {0}")]
    NotFound(PathBuf),

    /// Client-correctable problem with the requested edit.
    #[error("{0}")]
    InvalidInput(String),

    #[error("Could not open video file: {0}")]
    CannotOpen(String),

    #[error("Video processing failed: {0}")]
    Processing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error returned by every HTTP handler.
///
/// Server-side variants keep their detail for the log and hand clients a
/// generic message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::BadRequest(message) => {
                tracing::warn!(error = %message, "rejecting request");
                message.clone()
            }
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                "Server error".to_string()
            }
        };

        (
            self.status(),
            Json(json!({ "status": "error", "message": message })),
        )
            .into_response()
    }
}

impl From<ProcessingError> for ApiError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::InvalidInput(message) => Self::BadRequest(message),
            ProcessingError::NotFound(_) => Self::BadRequest("File not found".to_string()),
            ProcessingError::CannotOpen(detail) => {
                tracing::warn!(error = %detail, "uploaded file is not a readable video");
                Self::BadRequest("Could not open video file".to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => Self::BadRequest("File not found".to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Infected(_) => Self::BadRequest("File is infected".to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl(message) | FetchError::Unsupported(message) => {
                Self::BadRequest(message)
            }
            FetchError::TooLarge(limit) => Self::BadRequest(format!(
                "Remote video exceeds the {} MB limit",
                limit / (1024 * 1024)
            )),
            FetchError::Remote(detail) => {
                tracing::warn!(error = %detail, "remote download failed");
                Self::BadRequest("Could not download video from URL".to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("processing task failed: {}", err))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(format!("I/O error: {}", err))
    }
}

//! API error types.

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use perch_core::Platform;
use perch_metadata::MetadataError;
use perch_storage::StorageError;
use serde::Serialize;

/// How many missing files are named in the error message.
const MISSING_FILES_DISPLAY_LIMIT: usize = 5;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Files a rollback could not find.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_files: Option<Vec<String>>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error(
        "cannot roll back {platform} to {version}: {} file(s) missing: {}",
        missing_files.len(),
        format_missing_files(missing_files)
    )]
    MissingFiles {
        platform: Platform,
        version: String,
        missing_files: Vec<String>,
    },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("{0}")]
    Core(#[from] perch_core::Error),
}

fn format_missing_files(files: &[String]) -> String {
    if files.len() <= MISSING_FILES_DISPLAY_LIMIT {
        files.join(", ")
    } else {
        format!(
            "{}, ... and {} more",
            files[..MISSING_FILES_DISPLAY_LIMIT].join(", "),
            files.len() - MISSING_FILES_DISPLAY_LIMIT
        )
    }
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::MissingFiles { .. } => "missing_files",
            Self::Internal(_) => "internal_error",
            Self::Storage(e) if e.is_not_found() => "not_found",
            Self::Storage(_) => "storage_error",
            Self::Metadata(MetadataError::NotFound(_)) => "not_found",
            Self::Metadata(MetadataError::InvalidSetting(_)) => "bad_request",
            Self::Metadata(MetadataError::Domain(e)) => core_code(e),
            Self::Metadata(_) => "metadata_error",
            Self::Core(e) => core_code(e),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MissingFiles { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::InvalidKey(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Metadata(e) => match e {
                MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                MetadataError::InvalidSetting(_) => StatusCode::BAD_REQUEST,
                MetadataError::Domain(e) => core_status(e),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(e) => core_status(e),
        }
    }
}

fn core_code(e: &perch_core::Error) -> &'static str {
    match e {
        perch_core::Error::UnknownPlatform(_) => "unknown_platform",
        perch_core::Error::NoReleases(_) => "no_releases",
        perch_core::Error::InvalidVersion { .. } => "invalid_version",
        perch_core::Error::InvalidFileName(_) => "invalid_file_name",
        perch_core::Error::InvalidChecksum(_) => "invalid_checksum",
        perch_core::Error::Serialization(_) => "internal_error",
    }
}

fn core_status(e: &perch_core::Error) -> StatusCode {
    match e {
        perch_core::Error::UnknownPlatform(_) | perch_core::Error::NoReleases(_) => {
            StatusCode::NOT_FOUND
        }
        perch_core::Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(rejection.body_text())
        } else {
            Self::BadRequest(format!("invalid JSON body: {}", rejection.body_text()))
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(format!("invalid multipart body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let message = self.to_string();
        let code = self.code().to_string();
        let missing_files = match self {
            Self::MissingFiles { missing_files, .. } => Some(missing_files),
            _ => None,
        };
        let body = ErrorResponse {
            code,
            message,
            missing_files,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

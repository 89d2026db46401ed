//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt document {document}: {reason}")]
    Corrupt { document: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Domain(#[from] perch_core::Error),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported platform: {0}")]
    UnknownPlatform(String),

    #[error("invalid version {version:?}: {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    #[error("no releases available for platform {0}")]
    NoReleases(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

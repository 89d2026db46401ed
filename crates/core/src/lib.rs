//! Core domain types and shared logic for the Perch update server.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Supported platforms and semantic versions
//! - Artifact checksums
//! - Release, history, download and activity records
//! - Update manifest resolution (JSON and `latest.yml` forms)
//! - Configuration

pub mod checksum;
pub mod config;
pub mod error;
pub mod logs;
pub mod manifest;
pub mod platform;
pub mod release;
pub mod version;

pub use checksum::{Checksum, ChecksumHasher};
pub use error::{Error, Result};
pub use logs::{ActivityEntry, ActivityKind, DownloadLogEntry, DownloadStatus};
pub use manifest::{ManifestFile, UpdateCheck, UpdateManifest, UrlFallback, UrlResolver};
pub use platform::Platform;
pub use release::{HistoryEntry, HistoryFile, Release, ReleaseFile, ReleaseTable};
pub use version::ReleaseVersion;

/// Version every platform starts at before its first upload.
pub const INITIAL_VERSION: &str = "1.0.0";

/// Maximum number of history entries retained.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Maximum number of download log entries retained.
pub const DEFAULT_DOWNLOAD_LOG_LIMIT: usize = 500;

/// Maximum number of structured activity entries retained.
pub const DEFAULT_ACTIVITY_LIMIT: usize = 100;

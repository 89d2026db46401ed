//! Download log repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use perch_core::DownloadLogEntry;

/// Repository for the capped download log.
#[async_trait]
pub trait DownloadLogRepo: Send + Sync {
    /// Record a download attempt.
    async fn record_download(&self, entry: &DownloadLogEntry) -> MetadataResult<()>;

    /// List recorded attempts, oldest first.
    async fn list_downloads(&self) -> MetadataResult<Vec<DownloadLogEntry>>;
}

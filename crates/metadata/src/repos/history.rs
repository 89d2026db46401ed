//! Release history repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use perch_core::{HistoryEntry, Platform, ReleaseVersion};

/// Repository for the capped, append-only release history.
#[async_trait]
pub trait HistoryRepo: Send + Sync {
    /// Append an entry, dropping the oldest entries beyond the cap.
    async fn append_history(&self, entry: &HistoryEntry) -> MetadataResult<()>;

    /// List entries, oldest first.
    async fn list_history(&self) -> MetadataResult<Vec<HistoryEntry>>;

    /// Find the most recent entry for a platform and version.
    async fn find_history(
        &self,
        platform: Platform,
        version: &ReleaseVersion,
    ) -> MetadataResult<Option<HistoryEntry>>;

    /// Delete an entry by ID, returning it. `NotFound` if absent.
    async fn delete_history(&self, id: &str) -> MetadataResult<HistoryEntry>;
}

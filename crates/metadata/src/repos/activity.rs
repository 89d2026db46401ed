//! Activity log repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use perch_core::ActivityEntry;

/// Repository for administrative activity.
///
/// Every entry is written twice: as a line of the plain-text log and as a
/// structured record in a capped, newest-first list.
#[async_trait]
pub trait ActivityRepo: Send + Sync {
    /// Record an event in both forms.
    async fn record_activity(&self, entry: &ActivityEntry) -> MetadataResult<()>;

    /// List structured entries, newest first.
    async fn list_activity(&self) -> MetadataResult<Vec<ActivityEntry>>;

    /// Read the plain-text log. Empty when nothing has been logged.
    async fn read_activity_log(&self) -> MetadataResult<String>;

    /// Remove the text log and empty the structured list.
    async fn clear_activity(&self) -> MetadataResult<()>;
}

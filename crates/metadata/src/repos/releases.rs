//! Release table repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use perch_core::{Platform, Release, ReleaseTable, ReleaseVersion};
use time::OffsetDateTime;

/// Repository for the current release of each platform.
#[async_trait]
pub trait ReleaseRepo: Send + Sync {
    /// Get the whole release table.
    async fn get_releases(&self) -> MetadataResult<ReleaseTable>;

    /// Get the current release of one platform.
    async fn get_release(&self, platform: Platform) -> MetadataResult<Release>;

    /// Replace a platform's release, returning the superseded one.
    async fn replace_release(&self, platform: Platform, release: Release)
    -> MetadataResult<Release>;

    /// Set a platform's version without touching its files.
    async fn set_release_version(
        &self,
        platform: Platform,
        version: ReleaseVersion,
        now: OffsetDateTime,
    ) -> MetadataResult<Release>;

    /// Remove one file from a platform's release.
    ///
    /// Returns `NotFound` when the release has no file with that name.
    async fn remove_release_file(
        &self,
        platform: Platform,
        file_name: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<Release>;
}

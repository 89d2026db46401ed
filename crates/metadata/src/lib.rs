//! Metadata store abstraction and implementation for Perch.
//!
//! This crate persists the service's control-plane data:
//! - The current release of each platform
//! - The capped release history used for rollback
//! - Download and activity logs
//! - Deployment settings (`KEY=value` file)
//!
//! Every collection is a JSON document on disk, read fresh on each access and
//! replaced atomically on each write.

mod document;
pub mod envfile;
pub mod error;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use repos::{ActivityRepo, DownloadLogRepo, HistoryRepo, ReleaseRepo, SettingsRepo};
pub use store::{JsonStore, MetadataStore};

use perch_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    let store = JsonStore::new(config).await?;
    Ok(Arc::new(store) as Arc<dyn MetadataStore>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use perch_core::Platform;

    #[tokio::test]
    async fn test_from_config_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = MetadataConfig {
            data_dir: temp_dir.path().join("data"),
            ..MetadataConfig::default()
        };

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
        assert!(temp_dir.path().join("data").join(store::RELEASES_FILE).exists());
        let release = store.get_release(Platform::Win32).await.unwrap();
        assert_eq!(release.version.as_str(), perch_core::INITIAL_VERSION);
    }

    #[tokio::test]
    async fn test_from_config_rejects_zero_limits() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = MetadataConfig {
            data_dir: temp_dir.path().to_path_buf(),
            history_limit: 0,
            ..MetadataConfig::default()
        };
        assert!(matches!(
            from_config(&config).await,
            Err(MetadataError::Config(_))
        ));
    }
}

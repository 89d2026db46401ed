//! Metadata store trait and the JSON document implementation.

use crate::document::{JsonDocument, write_atomic};
use crate::envfile;
use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ActivityRepo, DownloadLogRepo, HistoryRepo, ReleaseRepo, SettingsRepo};
use async_trait::async_trait;
use perch_core::config::{MetadataConfig, SettingKey, SettingValue};
use perch_core::{
    ActivityEntry, DownloadLogEntry, HistoryEntry, Platform, Release, ReleaseTable,
    ReleaseVersion,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// File name of the release table.
pub const RELEASES_FILE: &str = "versions.json";
/// File name of the release history.
pub const HISTORY_FILE: &str = "version-history.json";
/// File name of the download log.
pub const DOWNLOAD_LOG_FILE: &str = "download-logs.json";
/// File name of the structured activity log.
pub const ACTIVITY_FILE: &str = "activity.json";
/// File name of the plain-text activity log.
pub const ACTIVITY_LOG_FILE: &str = "activity.log";

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    ReleaseRepo + HistoryRepo + DownloadLogRepo + ActivityRepo + SettingsRepo + Send + Sync
{
    /// Check that the store's documents are reachable and readable.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// Metadata store backed by JSON documents in a data directory.
pub struct JsonStore {
    data_dir: PathBuf,
    releases: JsonDocument<ReleaseTable>,
    history: JsonDocument<Vec<HistoryEntry>>,
    downloads: JsonDocument<Vec<DownloadLogEntry>>,
    activity: JsonDocument<Vec<ActivityEntry>>,
    activity_log_path: PathBuf,
    /// Serializes the text log with its structured twin.
    activity_lock: Mutex<()>,
    settings_path: PathBuf,
    settings_lock: Mutex<()>,
    history_limit: usize,
    download_log_limit: usize,
    activity_limit: usize,
}

impl JsonStore {
    /// Open (and initialise) a store from configuration.
    pub async fn new(config: &MetadataConfig) -> MetadataResult<Self> {
        config.validate().map_err(MetadataError::Config)?;
        let data_dir = config.data_dir.clone();
        fs::create_dir_all(&data_dir).await?;

        let settings_path = config.settings_path();
        if let Some(parent) = settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let store = Self {
            releases: JsonDocument::new(data_dir.join(RELEASES_FILE)),
            history: JsonDocument::new(data_dir.join(HISTORY_FILE)),
            downloads: JsonDocument::new(data_dir.join(DOWNLOAD_LOG_FILE)),
            activity: JsonDocument::new(data_dir.join(ACTIVITY_FILE)),
            activity_log_path: data_dir.join(ACTIVITY_LOG_FILE),
            activity_lock: Mutex::new(()),
            settings_path,
            settings_lock: Mutex::new(()),
            history_limit: config.history_limit,
            download_log_limit: config.download_log_limit,
            activity_limit: config.activity_limit,
            data_dir,
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Write the initial release table if none exists yet.
    ///
    /// An existing table is rewritten once so platforms missing from it are
    /// filled in with their initial release.
    async fn initialize(&self) -> MetadataResult<()> {
        let existed = self.releases.exists().await?;
        self.releases.update(|_| Ok(())).await?;
        if !existed {
            tracing::info!(
                path = %self.releases.path().display(),
                "initialised release table"
            );
        }
        Ok(())
    }
}

/// Drop the oldest entries so at most `limit` remain.
fn keep_last<T>(entries: &mut Vec<T>, limit: usize) {
    if entries.len() > limit {
        let excess = entries.len() - limit;
        entries.drain(..excess);
    }
}

#[async_trait]
impl ReleaseRepo for JsonStore {
    async fn get_releases(&self) -> MetadataResult<ReleaseTable> {
        self.releases.read().await
    }

    async fn get_release(&self, platform: Platform) -> MetadataResult<Release> {
        Ok(self.releases.read().await?.get(platform).clone())
    }

    async fn replace_release(
        &self,
        platform: Platform,
        release: Release,
    ) -> MetadataResult<Release> {
        self.releases
            .update(move |table| Ok(table.replace(platform, release)))
            .await
    }

    async fn set_release_version(
        &self,
        platform: Platform,
        version: ReleaseVersion,
        now: OffsetDateTime,
    ) -> MetadataResult<Release> {
        self.releases
            .update(move |table| {
                let release = table.get_mut(platform);
                release.version = version;
                release.last_updated = Some(now);
                Ok(release.clone())
            })
            .await
    }

    async fn remove_release_file(
        &self,
        platform: Platform,
        file_name: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<Release> {
        self.releases
            .update(|table| {
                let release = table.get_mut(platform);
                if !release.remove_file(file_name, now) {
                    return Err(MetadataError::NotFound(format!(
                        "file {file_name} in {platform} release"
                    )));
                }
                Ok(release.clone())
            })
            .await
    }
}

#[async_trait]
impl HistoryRepo for JsonStore {
    async fn append_history(&self, entry: &HistoryEntry) -> MetadataResult<()> {
        let limit = self.history_limit;
        self.history
            .update(|entries| {
                entries.push(entry.clone());
                keep_last(entries, limit);
                Ok(())
            })
            .await
    }

    async fn list_history(&self) -> MetadataResult<Vec<HistoryEntry>> {
        self.history.read().await
    }

    async fn find_history(
        &self,
        platform: Platform,
        version: &ReleaseVersion,
    ) -> MetadataResult<Option<HistoryEntry>> {
        let entries = self.history.read().await?;
        Ok(entries
            .into_iter()
            .rev()
            .find(|e| e.platform == platform && &e.version == version))
    }

    async fn delete_history(&self, id: &str) -> MetadataResult<HistoryEntry> {
        self.history
            .update(|entries| {
                let idx = entries
                    .iter()
                    .position(|e| e.id == id)
                    .ok_or_else(|| MetadataError::NotFound(format!("history entry {id}")))?;
                Ok(entries.remove(idx))
            })
            .await
    }
}

#[async_trait]
impl DownloadLogRepo for JsonStore {
    async fn record_download(&self, entry: &DownloadLogEntry) -> MetadataResult<()> {
        let limit = self.download_log_limit;
        self.downloads
            .update(|entries| {
                entries.push(entry.clone());
                keep_last(entries, limit);
                Ok(())
            })
            .await
    }

    async fn list_downloads(&self) -> MetadataResult<Vec<DownloadLogEntry>> {
        self.downloads.read().await
    }
}

#[async_trait]
impl ActivityRepo for JsonStore {
    async fn record_activity(&self, entry: &ActivityEntry) -> MetadataResult<()> {
        let line = entry.to_log_line()?;
        let limit = self.activity_limit;
        let _guard = self.activity_lock.lock().await;

        let mut log = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.activity_log_path)
            .await?;
        log.write_all(line.as_bytes()).await?;
        log.flush().await?;

        self.activity
            .update(|entries| {
                entries.insert(0, entry.clone());
                entries.truncate(limit);
                Ok(())
            })
            .await
    }

    async fn list_activity(&self) -> MetadataResult<Vec<ActivityEntry>> {
        self.activity.read().await
    }

    async fn read_activity_log(&self) -> MetadataResult<String> {
        match fs::read_to_string(&self.activity_log_path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(MetadataError::Io(e)),
        }
    }

    async fn clear_activity(&self) -> MetadataResult<()> {
        let _guard = self.activity_lock.lock().await;
        match fs::remove_file(&self.activity_log_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(MetadataError::Io(e)),
        }
        self.activity.replace(&Vec::new()).await
    }
}

#[async_trait]
impl SettingsRepo for JsonStore {
    async fn read_settings(&self) -> MetadataResult<BTreeMap<String, String>> {
        envfile::load(&self.settings_path).await
    }

    async fn write_settings(&self, updates: &[(SettingKey, SettingValue)]) -> MetadataResult<()> {
        let _guard = self.settings_lock.lock().await;
        let current = match fs::read_to_string(&self.settings_path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(MetadataError::Io(e)),
        };
        let updated = envfile::apply(&current, updates);
        write_atomic(&self.settings_path, updated.as_bytes()).await
    }
}

#[async_trait]
impl MetadataStore for JsonStore {
    async fn health_check(&self) -> MetadataResult<()> {
        let meta = fs::metadata(&self.data_dir).await?;
        if !meta.is_dir() {
            return Err(MetadataError::Config(format!(
                "data directory is not a directory: {}",
                self.data_dir.display()
            )));
        }
        self.releases.read().await?;
        Ok(())
    }
}

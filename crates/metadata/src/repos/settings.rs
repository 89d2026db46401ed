//! Deployment settings repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use perch_core::config::{SettingKey, SettingValue};
use std::collections::BTreeMap;

/// Repository for the `KEY=value` deployment settings file.
#[async_trait]
pub trait SettingsRepo: Send + Sync {
    /// Read all settings present in the file.
    async fn read_settings(&self) -> MetadataResult<BTreeMap<String, String>>;

    /// Write settings; each key replaces its existing line or is appended.
    async fn write_settings(&self, updates: &[(SettingKey, SettingValue)]) -> MetadataResult<()>;
}

//! Download and activity log records.

use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Outcome of a download attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Success,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded download attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLogEntry {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Platform segment as requested, which may not name a known platform.
    pub platform: String,
    pub filename: String,
    /// Version of the platform's current release when the attempt was made.
    pub version: String,
    pub ip_address: String,
    pub status: DownloadStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub download_time: OffsetDateTime,
}

impl DownloadLogEntry {
    pub fn new(
        platform: impl Into<String>,
        filename: impl Into<String>,
        version: impl Into<String>,
        ip_address: impl Into<String>,
        status: DownloadStatus,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            timestamp: now,
            platform: platform.into(),
            filename: filename.into(),
            version: version.into(),
            ip_address: ip_address.into(),
            status,
            download_time: now,
        }
    }
}

/// Category of an administrative event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Upload,
    Version,
    Delete,
    DeleteHistory,
    Rollback,
    Config,
    System,
    Download,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Version => "version",
            Self::Delete => "delete",
            Self::DeleteHistory => "delete_history",
            Self::Rollback => "rollback",
            Self::Config => "config",
            Self::System => "system",
            Self::Download => "download",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured activity record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ActivityEntry {
    pub fn new(kind: ActivityKind, title: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            kind,
            title: title.into(),
            timestamp: now,
        }
    }

    /// Render as a line of the plain-text activity log, including the newline.
    ///
    /// Format: `[<rfc3339>] [<TYPE>] <message>`.
    pub fn to_log_line(&self) -> crate::Result<String> {
        let timestamp = self
            .timestamp
            .format(&Rfc3339)
            .map_err(|e| crate::Error::Serialization(e.to_string()))?;
        Ok(format!(
            "[{}] [{}] {}\n",
            timestamp,
            self.kind.as_str().to_uppercase(),
            self.title
        ))
    }
}

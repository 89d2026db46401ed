//! Release records: the current release table and the release history.

use crate::checksum::Checksum;
use crate::platform::Platform;
use crate::version::ReleaseVersion;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// One artifact belonging to a release.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseFile {
    /// Stored file name (already carries the version, e.g. `Setup-1.2.0.exe`).
    pub name: String,
    /// Size in bytes, measured from the stored copy.
    pub size: u64,
    /// SHA-256 of the stored copy.
    pub checksum: Checksum,
    /// Absolute URL this file should be fetched from instead of this server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_url: Option<String>,
}

/// The release currently advertised for a platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub version: ReleaseVersion,
    /// Artifacts; the first entry is the primary installer.
    #[serde(default)]
    pub files: Vec<ReleaseFile>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub release_date: Option<OffsetDateTime>,
    /// Base URL overriding per-file URL construction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub last_updated: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rolled_back: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_back_from: Option<ReleaseVersion>,
}

impl Release {
    /// The empty release every platform starts with.
    pub fn initial() -> Self {
        Self {
            version: ReleaseVersion::initial(),
            files: Vec::new(),
            release_date: None,
            download_url: None,
            last_updated: None,
            rolled_back: false,
            rolled_back_from: None,
        }
    }

    /// Build the release that replaces the current one after an upload.
    pub fn from_upload(
        version: ReleaseVersion,
        files: Vec<ReleaseFile>,
        download_url: Option<String>,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            version,
            files,
            release_date: Some(now),
            download_url,
            last_updated: Some(now),
            rolled_back: false,
            rolled_back_from: None,
        }
    }

    /// Build the release restored from a history entry.
    ///
    /// `previous` is the version being replaced; it is recorded as provenance.
    pub fn from_history(
        entry: &HistoryEntry,
        previous: ReleaseVersion,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            version: entry.version.clone(),
            files: entry.files.iter().map(HistoryFile::to_release_file).collect(),
            release_date: Some(entry.release_date),
            download_url: None,
            last_updated: Some(now),
            rolled_back: true,
            rolled_back_from: Some(previous),
        }
    }

    /// The primary installer, if any files exist.
    pub fn primary_file(&self) -> Option<&ReleaseFile> {
        self.files.first()
    }

    /// Whether this release has any artifacts.
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// Remove a file by stored name. Returns whether anything was removed.
    pub fn remove_file(&mut self, name: &str, now: OffsetDateTime) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.name != name);
        let removed = self.files.len() != before;
        if removed {
            self.last_updated = Some(now);
        }
        removed
    }
}

impl Default for Release {
    fn default() -> Self {
        Self::initial()
    }
}

/// The release table: exactly one release per supported platform.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseTable {
    #[serde(default)]
    win32: Release,
    #[serde(default)]
    darwin: Release,
    #[serde(default)]
    linux: Release,
}

impl ReleaseTable {
    /// Get the release for a platform.
    pub fn get(&self, platform: Platform) -> &Release {
        match platform {
            Platform::Win32 => &self.win32,
            Platform::Darwin => &self.darwin,
            Platform::Linux => &self.linux,
        }
    }

    /// Get a mutable reference to the release for a platform.
    pub fn get_mut(&mut self, platform: Platform) -> &mut Release {
        match platform {
            Platform::Win32 => &mut self.win32,
            Platform::Darwin => &mut self.darwin,
            Platform::Linux => &mut self.linux,
        }
    }

    /// Replace a platform's release, returning the superseded one.
    pub fn replace(&mut self, platform: Platform, release: Release) -> Release {
        std::mem::replace(self.get_mut(platform), release)
    }

    /// Iterate over `(platform, release)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Platform, &Release)> {
        Platform::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

/// A file as recorded in the release history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFile {
    pub filename: String,
    pub size: u64,
    pub checksum: Checksum,
}

impl HistoryFile {
    fn to_release_file(&self) -> ReleaseFile {
        ReleaseFile {
            name: self.filename.clone(),
            size: self.size,
            checksum: self.checksum,
            custom_url: None,
        }
    }
}

/// An immutable record of a past release.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Unique, time-ordered identifier.
    pub id: String,
    pub platform: Platform,
    pub version: ReleaseVersion,
    pub files: Vec<HistoryFile>,
    pub file_count: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub release_date: OffsetDateTime,
}

impl HistoryEntry {
    /// Record a newly uploaded release.
    pub fn record(
        platform: Platform,
        version: ReleaseVersion,
        files: &[ReleaseFile],
        now: OffsetDateTime,
    ) -> Self {
        let files: Vec<HistoryFile> = files
            .iter()
            .map(|f| HistoryFile {
                filename: f.name.clone(),
                size: f.size,
                checksum: f.checksum,
            })
            .collect();
        Self {
            id: Uuid::now_v7().to_string(),
            platform,
            version,
            file_count: files.len(),
            files,
            release_date: now,
        }
    }
}

/// Reduce a client-supplied file name to a safe basename.
///
/// Browsers and CLI tools sometimes send full paths; only the final component
/// is kept. Names that are empty, dot-only, or contain control characters are
/// rejected.
pub fn sanitize_file_name(original: &str) -> crate::Result<String> {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        return Err(crate::Error::InvalidFileName(original.to_string()));
    }
    if base.chars().any(char::is_control) {
        return Err(crate::Error::InvalidFileName(original.to_string()));
    }
    Ok(base.to_string())
}

/// Embed a version into a file name: `Setup.exe` + `1.2.0` -> `Setup-1.2.0.exe`.
///
/// Only the final extension is kept after the version (`app.tar.gz` becomes
/// `app.tar-1.2.0.gz`); a leading dot does not start an extension.
pub fn versioned_file_name(original: &str, version: &ReleaseVersion) -> String {
    match original.rfind('.') {
        Some(idx) if idx > 0 => {
            let (stem, ext) = original.split_at(idx);
            format!("{stem}-{version}{ext}")
        }
        _ => format!("{original}-{version}"),
    }
}

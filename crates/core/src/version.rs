//! Semantic versions for releases and client update checks.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A validated semantic version.
///
/// Accepts an optional leading `v` (`v1.2.3`) and surrounding whitespace,
/// which desktop clients commonly send. The original text is preserved so the
/// release table round-trips exactly what was uploaded.
#[derive(Clone)]
pub struct ReleaseVersion {
    raw: String,
    parsed: semver::Version,
}

impl ReleaseVersion {
    /// Parse a version string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidVersion {
                version: s.to_string(),
                reason: "version is empty".to_string(),
            });
        }

        let unprefixed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let parsed =
            semver::Version::parse(unprefixed).map_err(|e| crate::Error::InvalidVersion {
                version: s.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            raw: trimmed.to_string(),
            parsed,
        })
    }

    /// The version every platform starts at before its first upload.
    pub fn initial() -> Self {
        Self {
            raw: crate::INITIAL_VERSION.to_string(),
            parsed: semver::Version::new(1, 0, 0),
        }
    }

    /// The version as it was supplied (trimmed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this version is strictly newer than `other`.
    pub fn is_newer_than(&self, other: &ReleaseVersion) -> bool {
        self.parsed > other.parsed
    }
}

impl PartialEq for ReleaseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.parsed == other.parsed
    }
}

impl Eq for ReleaseVersion {}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parsed.cmp(&other.parsed)
    }
}

impl FromStr for ReleaseVersion {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReleaseVersion({})", self.raw)
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Serialize for ReleaseVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ReleaseVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

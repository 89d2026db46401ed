//! Key layout for stored artifacts.
//!
//! Committed artifacts live at `<platform>/<file name>`. Uploads are first
//! written under `.staging/` and renamed into place once every file of a
//! release has been received.

use crate::error::{StorageError, StorageResult};
use perch_core::Platform;
use uuid::Uuid;

/// Prefix holding in-progress uploads.
pub const STAGING_PREFIX: &str = ".staging";

/// Key of a committed artifact.
pub fn artifact_key(platform: Platform, file_name: &str) -> StorageResult<String> {
    if file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\'])
    {
        return Err(StorageError::InvalidKey(format!(
            "invalid artifact file name: {file_name:?}"
        )));
    }
    Ok(format!("{}/{}", platform.as_str(), file_name))
}

/// A fresh, unique staging key.
pub fn staging_key() -> String {
    format!("{}/{}", STAGING_PREFIX, Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_key() {
        assert_eq!(
            artifact_key(Platform::Darwin, "App-1.2.0.dmg").unwrap(),
            "darwin/App-1.2.0.dmg"
        );
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(artifact_key(Platform::Win32, bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_staging_keys_are_unique() {
        let a = staging_key();
        let b = staging_key();
        assert!(a.starts_with(".staging/"));
        assert_ne!(a, b);
    }
}

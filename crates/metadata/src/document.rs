//! A JSON document persisted as one file.

use crate::error::{MetadataError, MetadataResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A single JSON file holding a value of type `T`.
///
/// Nothing is cached: every read parses the file and every write replaces it
/// atomically (temp file, fsync, rename). Read-modify-write cycles go through
/// [`JsonDocument::update`], which holds the document's mutex so concurrent
/// updates never lose each other's changes. A missing or blank file reads as
/// `T::default()`; anything unparsable is reported as [`MetadataError::Corrupt`].
pub(crate) struct JsonDocument<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default + Send,
{
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current value.
    pub(crate) async fn read(&self) -> MetadataResult<T> {
        self.load().await
    }

    /// Whether the file exists yet.
    pub(crate) async fn exists(&self) -> MetadataResult<bool> {
        Ok(fs::try_exists(&self.path).await?)
    }

    /// Apply `f` to the stored value and persist the result.
    ///
    /// Nothing is written when `f` returns an error.
    pub(crate) async fn update<R, F>(&self, f: F) -> MetadataResult<R>
    where
        F: FnOnce(&mut T) -> MetadataResult<R> + Send,
    {
        let _guard = self.lock.lock().await;
        let mut value = self.load().await?;
        let result = f(&mut value)?;
        self.save(&value).await?;
        Ok(result)
    }

    /// Overwrite the stored value.
    pub(crate) async fn replace(&self, value: &T) -> MetadataResult<()> {
        let _guard = self.lock.lock().await;
        self.save(value).await
    }

    async fn load(&self) -> MetadataResult<T> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(MetadataError::Io(e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| MetadataError::Corrupt {
            document: self.display_name(),
            reason: e.to_string(),
        })
    }

    async fn save(&self, value: &T) -> MetadataResult<()> {
        let mut data = serde_json::to_vec_pretty(value)?;
        data.push(b'\n');
        write_atomic(&self.path, &data).await
    }

    fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Replace `path` with `data` via a sibling temp file.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> MetadataResult<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{name}.tmp-{}", Uuid::new_v4()));

    let written = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(MetadataError::Io(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_and_blank_files_read_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let doc: JsonDocument<Vec<u32>> = JsonDocument::new(dir.path().join("list.json"));
        assert!(doc.read().await.unwrap().is_empty());
        assert!(!doc.exists().await.unwrap());

        std::fs::write(doc.path(), "  \n").unwrap();
        assert!(doc.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let doc: JsonDocument<Vec<u32>> = JsonDocument::new(dir.path().join("list.json"));
        std::fs::write(doc.path(), "{not json").unwrap();

        match doc.read().await {
            Err(MetadataError::Corrupt { document, .. }) => assert_eq!(document, "list.json"),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_update_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let doc: JsonDocument<Vec<u32>> = JsonDocument::new(dir.path().join("list.json"));
        doc.replace(&vec![1]).await.unwrap();

        let result: MetadataResult<()> = doc
            .update(|v| {
                v.push(2);
                Err(MetadataError::NotFound("nope".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(doc.read().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let doc: Arc<JsonDocument<Vec<u32>>> =
            Arc::new(JsonDocument::new(dir.path().join("list.json")));

        let mut handles = Vec::new();
        for i in 0..32u32 {
            let doc = doc.clone();
            handles.push(tokio::spawn(async move {
                doc.update(|v| {
                    v.push(i);
                    Ok(())
                })
                .await
                .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut values = doc.read().await.unwrap();
        values.sort();
        assert_eq!(values, (0..32).collect::<Vec<_>>());

        // No temp files left behind.
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }
}

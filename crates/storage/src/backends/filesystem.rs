//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ArtifactStore, ByteStream, ObjectMeta, StreamingUpload};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::instrument;
use uuid::Uuid;

/// Read buffer size for streaming downloads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem artifact store.
///
/// Objects are plain files under `root`; a key's `/` separators map to
/// directories. Files whose name starts with `.` are in-flight temporaries and
/// are never listed.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating `root` if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve a key to a path inside the root.
    ///
    /// Canonicalization touches the filesystem, so it runs on the blocking pool.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || resolve_key(&root, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Map a key onto `root`, rejecting anything that could land outside it.
///
/// Every component must be a plain name. The nearest existing entry on the
/// path (the target itself or an ancestor directory) must canonicalize to a
/// location inside the root, which rules out escapes through symlinks.
fn resolve_key(root: &Path, key: &str) -> StorageResult<PathBuf> {
    if key.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "backslash not allowed in key: {key}"
        )));
    }
    if Path::new(key)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(StorageError::InvalidKey(format!(
            "contains unsafe path component: {key}"
        )));
    }

    let path = root.join(key);
    let root_canonical = root.canonicalize().map_err(|e| {
        StorageError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to canonicalize root: {e}"),
        ))
    })?;

    let mut probe = Some(path.as_path());
    while let Some(candidate) = probe {
        match std::fs::symlink_metadata(candidate) {
            Ok(meta) => {
                let resolved = candidate.canonicalize().map_err(|e| {
                    if meta.file_type().is_symlink() {
                        StorageError::InvalidKey(format!("dangling symlink in key: {key}"))
                    } else {
                        StorageError::Io(e)
                    }
                })?;
                if !resolved.starts_with(&root_canonical) {
                    return Err(StorageError::InvalidKey(format!(
                        "resolved path escapes storage root: {key}"
                    )));
                }
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => probe = candidate.parent(),
            Err(e) => return Err(StorageError::Io(e)),
        }
    }

    Ok(path)
}

/// Sibling temp path used while writing `path`.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp-{}", Uuid::new_v4()))
}

fn not_found_or_io(key: &str, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl ArtifactStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_path(key).await?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let path = self.key_path(key).await?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        Ok(ObjectMeta {
            size: metadata.len(),
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_path(key).await?;
        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))?;

        let stream = async_stream::try_stream! {
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let mut upload = self.put_stream(key).await?;
        if let Err(e) = upload.write(data).await {
            upload.abort().await?;
            return Err(e);
        }
        upload.finish().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        let path = self.key_path(key).await?;
        self.ensure_parent(&path).await?;

        let temp_path = temp_path_for(&path);
        let file = fs::File::create(&temp_path).await?;

        Ok(Box::new(FilesystemUpload {
            file,
            temp_path,
            final_path: path,
            bytes_written: 0,
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let from_path = self.key_path(from).await?;
        let to_path = self.key_path(to).await?;
        self.ensure_parent(&to_path).await?;
        fs::rename(&from_path, &to_path)
            .await
            .map_err(|e| not_found_or_io(from, e))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key).await?;
        fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let base_path = self.key_path(prefix).await?;
        let mut results = Vec::new();

        match fs::metadata(&base_path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(results),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(results),
            Err(e) => return Err(StorageError::Io(e)),
        }

        let mut stack = vec![base_path];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let path = entry.path();
                // file_type() does not follow symlinks; links are skipped.
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file()
                    && let Ok(rel) = path.strip_prefix(&self.root)
                {
                    let key = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    results.push(key);
                }
            }
        }

        results.sort();
        Ok(results)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn ensure_prefix(&self, prefix: &str) -> StorageResult<()> {
        let path = self.key_path(prefix).await?;
        fs::create_dir_all(&path).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}

/// Streaming upload into a temp file that is renamed into place on finish.
struct FilesystemUpload {
    file: fs::File,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

#[async_trait]
impl StreamingUpload for FilesystemUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.file.write_all(&data).await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        let Self {
            file,
            temp_path,
            final_path,
            bytes_written,
        } = *self;
        drop(file);
        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }
        Ok(bytes_written)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        let Self {
            file, temp_path, ..
        } = *self;
        drop(file);
        match fs::remove_file(&temp_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn backend() -> (tempfile::TempDir, FilesystemBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();
        (dir, backend)
    }

    async fn read(backend: &FilesystemBackend, key: &str) -> StorageResult<Bytes> {
        let mut stream = backend.get_stream(key).await?;
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(collected))
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (_dir, backend) = backend().await;

        let data = Bytes::from("hello world");
        backend.put("win32/Setup-1.0.0.exe", data.clone()).await.unwrap();

        assert!(backend.exists("win32/Setup-1.0.0.exe").await.unwrap());
        assert_eq!(read(&backend, "win32/Setup-1.0.0.exe").await.unwrap(), data);
        assert_eq!(backend.head("win32/Setup-1.0.0.exe").await.unwrap().size, 11);
    }

    #[tokio::test]
    async fn test_missing_objects_report_not_found() {
        let (_dir, backend) = backend().await;

        assert!(!backend.exists("linux/app.AppImage").await.unwrap());
        assert!(backend.head("linux/app.AppImage").await.unwrap_err().is_not_found());
        assert!(backend.delete("linux/app.AppImage").await.unwrap_err().is_not_found());
        assert!(backend.get_stream("linux/app.AppImage").await.err().unwrap().is_not_found());
    }

    #[tokio::test]
    async fn test_directory_is_not_an_object() {
        let (_dir, backend) = backend().await;
        backend.ensure_prefix("darwin").await.unwrap();
        assert!(!backend.exists("darwin").await.unwrap());
    }

    #[tokio::test]
    async fn test_streaming_upload_visible_only_after_finish() {
        let (_dir, backend) = backend().await;

        let mut upload = backend.put_stream("darwin/App.dmg").await.unwrap();
        upload.write(Bytes::from_static(b"part one, ")).await.unwrap();
        upload.write(Bytes::from_static(b"part two")).await.unwrap();
        assert!(!backend.exists("darwin/App.dmg").await.unwrap());
        assert!(backend.list("darwin").await.unwrap().is_empty());

        assert_eq!(upload.finish().await.unwrap(), 18);
        assert_eq!(
            read(&backend, "darwin/App.dmg").await.unwrap(),
            Bytes::from_static(b"part one, part two")
        );
    }

    #[tokio::test]
    async fn test_aborted_upload_leaves_nothing() {
        let (dir, backend) = backend().await;

        let mut upload = backend.put_stream("linux/app.deb").await.unwrap();
        upload.write(Bytes::from_static(b"junk")).await.unwrap();
        upload.abort().await.unwrap();

        assert!(!backend.exists("linux/app.deb").await.unwrap());
        let leftovers = std::fs::read_dir(dir.path().join("linux")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_rename_replaces_target() {
        let (_dir, backend) = backend().await;

        backend.put(".staging/abc", Bytes::from("new")).await.unwrap();
        backend.put("win32/a.exe", Bytes::from("old")).await.unwrap();
        backend.rename(".staging/abc", "win32/a.exe").await.unwrap();

        assert_eq!(read(&backend, "win32/a.exe").await.unwrap(), Bytes::from("new"));
        assert!(!backend.exists(".staging/abc").await.unwrap());
        assert!(
            backend
                .rename(".staging/abc", "win32/b.exe")
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_list_skips_hidden_entries() {
        let (_dir, backend) = backend().await;

        backend.put("win32/b.exe", Bytes::from("b")).await.unwrap();
        backend.put("win32/a.exe", Bytes::from("a")).await.unwrap();
        backend.put("linux/c.deb", Bytes::from("c")).await.unwrap();
        backend.put(".staging/x", Bytes::from("x")).await.unwrap();

        assert_eq!(
            backend.list("win32").await.unwrap(),
            vec!["win32/a.exe".to_string(), "win32/b.exe".to_string()]
        );
        assert_eq!(backend.list("").await.unwrap().len(), 3);
        assert_eq!(backend.list(".staging").await.unwrap(), vec![".staging/x"]);
        assert!(backend.list("darwin").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_stream_yields_all_bytes() {
        let (_dir, backend) = backend().await;

        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        backend.put("win32/big.exe", Bytes::from(data.clone())).await.unwrap();

        assert_eq!(read(&backend, "win32/big.exe").await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let (_dir, backend) = backend().await;

        for key in ["../escape", "/absolute/path", "foo/../bar", "win32\\..\\x", "./a"] {
            assert!(
                matches!(
                    backend.exists(key).await,
                    Err(StorageError::InvalidKey(_))
                ),
                "{key} should be rejected"
            );
        }
        assert!(backend.exists("valid/nested/key").await.is_ok());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_symlink_escape_rejected() {
        use std::os::unix::fs::symlink;

        let (dir, backend) = backend().await;
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "secret").unwrap();

        symlink(outside.path().join("secret.txt"), dir.path().join("link")).unwrap();
        match read(&backend, "link").await {
            Err(StorageError::InvalidKey(msg)) => assert!(msg.contains("escapes storage root")),
            other => panic!("expected InvalidKey, got {other:?}"),
        }

        // Writes through a symlinked directory with missing children are caught
        // at the nearest existing ancestor.
        symlink(outside.path(), dir.path().join("escape")).unwrap();
        let result = backend.put("escape/nested/file.exe", Bytes::from("x")).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
        assert!(!outside.path().join("nested").exists());
    }
}

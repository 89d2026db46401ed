//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Artifact store abstraction.
///
/// Keys are `/`-separated relative paths such as `win32/Setup-1.2.0.exe`.
/// Backends must reject keys that would escape their root.
#[async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's metadata without fetching content.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Get an object as a byte stream.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Put an object atomically, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Start a streaming upload. The object becomes visible on `finish`.
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>>;

    /// Move an object to a new key, replacing any object already there.
    async fn rename(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List object keys under a prefix.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Make sure a key prefix can hold objects (e.g. create the directory).
    async fn ensure_prefix(&self, _prefix: &str) -> StorageResult<()> {
        Ok(())
    }

    /// Get the name of this storage backend, for logs and metrics.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable and usable.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
}

/// Trait for streaming uploads.
#[async_trait]
pub trait StreamingUpload: Send {
    /// Write a chunk of data.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Finish the upload and return the total bytes written.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Abort the upload, discarding anything written.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}

//! Artifact storage for Perch.
//!
//! This crate provides:
//! - The [`ArtifactStore`] abstraction with streaming reads and uploads
//! - A local filesystem backend with atomic writes and traversal protection
//! - The platform-scoped key layout and staging area for uploads
//! - Streaming checksum computation over stored objects

pub mod backends;
pub mod error;
pub mod keys;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use keys::{STAGING_PREFIX, artifact_key, staging_key};
pub use traits::{ArtifactStore, ByteStream, ObjectMeta, StreamingUpload};

use futures::StreamExt;
use perch_core::config::StorageConfig;
use perch_core::{Checksum, Platform};
use std::sync::Arc;

/// Create an artifact store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ArtifactStore>> {
    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
    }
}

/// Compute the SHA-256 checksum and size of a stored object by streaming it.
pub async fn checksum_object(
    store: &dyn ArtifactStore,
    key: &str,
) -> StorageResult<(Checksum, u64)> {
    let mut stream = store.get_stream(key).await?;
    let mut hasher = Checksum::hasher();
    while let Some(chunk) = stream.next().await {
        hasher.update(&chunk?);
    }
    let size = hasher.bytes_hashed();
    Ok((hasher.finalize(), size))
}

/// Prepare a store for serving: create every platform prefix and discard
/// uploads left in staging by an interrupted process.
///
/// Returns the number of stale staging objects removed.
pub async fn prepare(store: &dyn ArtifactStore) -> StorageResult<usize> {
    for platform in Platform::ALL {
        store.ensure_prefix(platform.as_str()).await?;
    }

    let stale = store.list(STAGING_PREFIX).await?;
    let mut removed = 0;
    for key in stale {
        match store.delete(&key).await {
            Ok(()) => removed += 1,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }
    if removed > 0 {
        tracing::info!(removed, "discarded stale staged uploads");
    }
    Ok(removed)
}

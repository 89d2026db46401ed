//! Application state shared across handlers.

use perch_core::Platform;
use perch_core::config::AppConfig;
use perch_metadata::MetadataStore;
use perch_storage::ArtifactStore;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// One async mutex per platform.
///
/// Every operation that mutates a platform's release (upload, rollback, file
/// deletion, version set) holds that platform's lock for its whole duration,
/// so mutations of one platform run one at a time while other platforms
/// proceed in parallel.
#[derive(Default)]
pub struct PlatformLocks {
    win32: Mutex<()>,
    darwin: Mutex<()>,
    linux: Mutex<()>,
}

impl PlatformLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a platform's release.
    pub async fn lock(&self, platform: Platform) -> MutexGuard<'_, ()> {
        match platform {
            Platform::Win32 => self.win32.lock().await,
            Platform::Darwin => self.darwin.lock().await,
            Platform::Linux => self.linux.lock().await,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Artifact storage backend.
    pub storage: Arc<dyn ArtifactStore>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Per-platform release locks.
    pub platform_locks: Arc<PlatformLocks>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ArtifactStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            metadata,
            platform_locks: Arc::new(PlatformLocks::new()),
        }
    }

    /// Deployment-wide custom download base URL, if configured.
    pub fn download_base(&self) -> Option<&str> {
        self.config.update.download_base()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_platform_locks_are_independent() {
        let locks = PlatformLocks::new();
        let _win = locks.lock(Platform::Win32).await;

        // Another platform is still available.
        let linux = tokio::time::timeout(Duration::from_millis(100), locks.lock(Platform::Linux))
            .await;
        assert!(linux.is_ok());

        // The same platform is not.
        let win_again =
            tokio::time::timeout(Duration::from_millis(50), locks.lock(Platform::Win32)).await;
        assert!(win_again.is_err());
    }
}

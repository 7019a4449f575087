//! Local cache with per-path reservations and atomic commits
//!
//! Presence of a file at its destination path is the only cache-hit signal.
//! Partial downloads never appear there: data is written to a unique sibling
//! temp path and renamed into place once complete.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::constants::files;
use crate::errors::{CacheError, CacheResult};

use super::config::CacheConfig;
use super::reservation::{PathLock, ReservationGuard, ReservationStatus};
use super::stats::CacheStats;

/// Filesystem cache of downloaded index and data files
#[derive(Debug)]
pub struct LocalCache {
    /// Configuration
    config: CacheConfig,
    /// One lock per destination path ever reserved
    reservations: Arc<RwLock<HashMap<PathBuf, PathLock>>>,
    /// Temp file sequence number
    temp_counter: AtomicU64,
    /// Successful commits
    commits: AtomicU64,
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl LocalCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            reservations: Arc::new(RwLock::new(HashMap::new())),
            temp_counter: AtomicU64::new(0),
            commits: AtomicU64::new(0),
        }
    }

    /// Get the cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Check whether a destination is already present
    ///
    /// No size or checksum validation is performed.
    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Wait for exclusive ownership of `path`
    ///
    /// At most one guard per path exists at any time. The returned guard does
    /// not imply the file is absent; see [`LocalCache::check_and_reserve`].
    pub async fn reserve(&self, path: &Path) -> ReservationGuard {
        let lock = {
            let mut reservations = self.reservations.write().await;
            reservations
                .entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let started = Instant::now();
        let guard = lock.lock_owned().await;
        let waited = started.elapsed();

        if waited.as_millis() > 0 {
            debug!(
                "Waited {:?} for reservation on {}",
                waited,
                path.display()
            );
        }
        ReservationGuard::new(path.to_path_buf(), waited, guard)
    }

    /// Check if a destination exists and otherwise reserve it
    ///
    /// Existence is checked again once the reservation is held, so a caller
    /// that waited behind another task producing the same file sees it as
    /// already present.
    pub async fn check_and_reserve(&self, path: &Path) -> ReservationStatus {
        if self.exists(path) {
            debug!("Cache hit: {}", path.display());
            return ReservationStatus::AlreadyExists;
        }

        let guard = self.reserve(path).await;
        if self.exists(path) {
            debug!(
                "Cache hit after waiting {:?}: {}",
                guard.waited(),
                path.display()
            );
            return ReservationStatus::AlreadyExists;
        }

        ReservationStatus::Reserved(guard)
    }

    /// Unique sibling temp path for `path`, e.g. `x.grib2.4711.3.tmp`
    pub fn temp_path(&self, path: &Path) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let mut name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(format!(
            ".{}.{}{}",
            std::process::id(),
            n,
            files::TEMP_FILE_SUFFIX
        ));
        path.with_file_name(name)
    }

    /// Ensure the parent directory of `path` exists
    ///
    /// # Errors
    ///
    /// Returns `CacheError::DirectoryNotAccessible` if it is missing and
    /// cannot (or may not) be created
    pub async fn prepare(&self, path: &Path) -> CacheResult<()> {
        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        if parent.is_dir() {
            return Ok(());
        }
        if !self.config.create_dirs {
            return Err(CacheError::DirectoryNotAccessible {
                path: parent.to_path_buf(),
            });
        }
        fs::create_dir_all(parent).await.map_err(|e| {
            error!("Failed to create directory {}: {}", parent.display(), e);
            CacheError::DirectoryNotAccessible {
                path: parent.to_path_buf(),
            }
        })?;
        debug!("Created directory: {}", parent.display());
        Ok(())
    }

    /// Atomically move a completed temp file to its final path
    ///
    /// On failure the temp file is removed.
    pub async fn commit(&self, temp_path: &Path, final_path: &Path) -> CacheResult<()> {
        if let Err(e) = fs::rename(temp_path, final_path).await {
            error!("Failed to rename temporary file: {}", e);
            self.discard(temp_path).await;
            return Err(CacheError::AtomicOperationFailed {
                temp_path: temp_path.to_path_buf(),
                final_path: final_path.to_path_buf(),
            });
        }
        self.commits.fetch_add(1, Ordering::Relaxed);
        info!("Saved {}", final_path.display());
        Ok(())
    }

    /// Remove a temp file, ignoring a missing one
    pub async fn discard(&self, temp_path: &Path) {
        match fs::remove_file(temp_path).await {
            Ok(()) => debug!("Removed temporary file {}", temp_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove temporary file {}: {}",
                temp_path.display(),
                e
            ),
        }
    }

    /// Drop registry entries no task holds or waits on
    pub async fn cleanup_idle_reservations(&self) -> usize {
        let mut reservations = self.reservations.write().await;
        let initial_count = reservations.len();

        // Holders and waiters keep their own clone of the lock
        reservations.retain(|_, lock| Arc::strong_count(lock) > 1);

        let cleaned = initial_count - reservations.len();
        if cleaned > 0 {
            debug!("Cleaned up {} idle reservations", cleaned);
        }
        cleaned
    }

    /// Check if a path is currently reserved
    pub async fn is_reserved(&self, path: &Path) -> bool {
        let reservations = self.reservations.read().await;
        reservations
            .get(path)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let reservations = self.reservations.read().await;
        let held = reservations
            .values()
            .filter(|lock| lock.try_lock().is_err())
            .count();

        CacheStats {
            tracked_reservations: reservations.len(),
            held_reservations: held,
            temp_files_issued: self.temp_counter.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_exists_is_presence_only() {
        let temp_dir = TempDir::new().unwrap();
        let cache = LocalCache::default();
        let path = temp_dir.path().join("a.grib2");

        assert!(!cache.exists(&path));
        fs::write(&path, b"").await.unwrap();
        assert!(cache.exists(&path));
        assert!(!cache.exists(temp_dir.path()));
    }

    #[tokio::test]
    async fn test_temp_paths_are_unique_siblings() {
        let cache = LocalCache::default();
        let path = Path::new("/data/NBM_x.co.grib2");

        let first = cache.temp_path(path);
        let second = cache.temp_path(path);

        assert_ne!(first, second);
        assert_eq!(first.parent(), path.parent());
        let name = first.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("NBM_x.co.grib2."));
        assert!(name.ends_with(".tmp"));
        assert!(name.contains(&std::process::id().to_string()));
    }

    #[tokio::test]
    async fn test_reservation_system() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Arc::new(LocalCache::default());
        let path = temp_dir.path().join("a.grib2");

        let status = cache.check_and_reserve(&path).await;
        let guard = match status {
            ReservationStatus::Reserved(guard) => guard,
            other => panic!("Expected reservation, got {:?}", other),
        };
        assert!(cache.is_reserved(&path).await);

        // Second caller waits until the first commits, then sees the file
        let waiter = {
            let cache = cache.clone();
            let path = path.clone();
            tokio::spawn(async move { cache.check_and_reserve(&path).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let temp = cache.temp_path(&path);
        fs::write(&temp, b"data").await.unwrap();
        cache.commit(&temp, &path).await.unwrap();
        drop(guard);

        let status = waiter.await.unwrap();
        assert!(matches!(status, ReservationStatus::AlreadyExists));
        assert!(!cache.is_reserved(&path).await);
    }

    #[tokio::test]
    async fn test_reservation_released_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let cache = LocalCache::default();
        let path = temp_dir.path().join("a.grib2");

        let guard = cache.reserve(&path).await;
        drop(guard);

        // Nothing was written, so the next caller must produce the file
        let status = cache.check_and_reserve(&path).await;
        assert!(status.is_reserved());
    }

    #[tokio::test]
    async fn test_atomic_commit() {
        let temp_dir = TempDir::new().unwrap();
        let cache = LocalCache::default();
        let path = temp_dir.path().join("a.grib2");
        let temp = cache.temp_path(&path);

        fs::write(&temp, b"grib").await.unwrap();
        cache.commit(&temp, &path).await.unwrap();

        assert!(!temp.exists());
        assert_eq!(fs::read(&path).await.unwrap(), b"grib");
        assert_eq!(cache.stats().await.commits, 1);
    }

    #[tokio::test]
    async fn test_commit_missing_temp_fails() {
        let temp_dir = TempDir::new().unwrap();
        let cache = LocalCache::default();
        let path = temp_dir.path().join("a.grib2");
        let temp = cache.temp_path(&path);

        let result = cache.commit(&temp, &path).await;
        assert!(matches!(
            result,
            Err(CacheError::AtomicOperationFailed { .. })
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_discard_is_best_effort() {
        let temp_dir = TempDir::new().unwrap();
        let cache = LocalCache::default();
        let temp = temp_dir.path().join("x.tmp");

        cache.discard(&temp).await;
        fs::write(&temp, b"partial").await.unwrap();
        cache.discard(&temp).await;
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn test_prepare_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/a.grib2");

        let cache = LocalCache::default();
        cache.prepare(&path).await.unwrap();
        assert!(temp_dir.path().join("nested/dir").is_dir());

        let strict = LocalCache::new(CacheConfig::default().with_create_dirs(false));
        let other = temp_dir.path().join("missing/a.grib2");
        assert!(matches!(
            strict.prepare(&other).await,
            Err(CacheError::DirectoryNotAccessible { .. })
        ));
    }

    #[tokio::test]
    async fn test_cleanup_idle_reservations() {
        let temp_dir = TempDir::new().unwrap();
        let cache = LocalCache::default();

        let held = cache.reserve(&temp_dir.path().join("a")).await;
        drop(cache.reserve(&temp_dir.path().join("b")).await);
        drop(cache.reserve(&temp_dir.path().join("c")).await);

        let stats = cache.stats().await;
        assert_eq!(stats.tracked_reservations, 3);
        assert_eq!(stats.held_reservations, 1);

        assert_eq!(cache.cleanup_idle_reservations().await, 2);
        assert_eq!(cache.stats().await.tracked_reservations, 1);

        drop(held);
        assert_eq!(cache.cleanup_idle_reservations().await, 1);
    }
}

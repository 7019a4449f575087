//! Cache configuration types and defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{CacheError, CacheResult};

/// Configuration for the local cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default destination directory (OS-specific if None)
    pub cache_root: Option<PathBuf>,
    /// Create missing destination directories before writing
    pub create_dirs: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_root: None, // Will use OS-specific cache directory
            create_dirs: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with custom cache root
    pub fn with_cache_root(cache_root: PathBuf) -> Self {
        Self {
            cache_root: Some(cache_root),
            ..Default::default()
        }
    }

    /// Enable or disable creation of missing destination directories
    pub fn with_create_dirs(mut self, enabled: bool) -> Self {
        self.create_dirs = enabled;
        self
    }

    /// Configured root, or the OS cache directory
    ///
    /// - macOS: ~/Library/Caches/grib-fetcher
    /// - Linux: ~/.cache/grib-fetcher
    /// - Windows: %LOCALAPPDATA%/grib-fetcher
    pub fn resolve_root(&self) -> CacheResult<PathBuf> {
        match &self.cache_root {
            Some(path) => Ok(path.clone()),
            None => Ok(dirs::cache_dir()
                .ok_or_else(|| CacheError::DirectoryNotAccessible {
                    path: PathBuf::from("system cache directory"),
                })?
                .join("grib-fetcher")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.cache_root, None);
        assert!(config.create_dirs);
    }

    #[test]
    fn test_config_builder() {
        let cache_root = PathBuf::from("/tmp/test");
        let config = CacheConfig::with_cache_root(cache_root.clone()).with_create_dirs(false);

        assert_eq!(config.cache_root, Some(cache_root.clone()));
        assert!(!config.create_dirs);
        assert_eq!(config.resolve_root().unwrap(), cache_root);
    }
}

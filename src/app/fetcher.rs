//! Cache-aware partial fetches
//!
//! [`PartialFetcher::fetch`] makes one remote object (or a byte range of it)
//! present at a local path:
//!
//! 1. return at once if the destination already exists
//! 2. reserve the destination and check again, since another task may have
//!    produced it meanwhile
//! 3. copy into a temp path through the [`ObjectStore`], bounded by a timeout
//!    and racing the caller's cancellation token
//! 4. rename into place, or remove the temp file on any failure

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::cache::{LocalCache, ReservationStatus};
use crate::app::range::ByteRange;
use crate::app::store::ObjectStore;
use crate::constants::workers;
use crate::errors::{TransferError, TransferFailure, TransferResult};

/// Fetch behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Upper bound on a single copy, excluding time spent waiting for a
    /// reservation
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: workers::FETCH_TIMEOUT,
        }
    }
}

/// Counters across all fetches of one fetcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Fetches satisfied by an existing destination
    pub cache_hits: u64,
    /// Completed copies
    pub transfers: u64,
    /// Bytes written by completed copies
    pub bytes_transferred: u64,
    /// Failed, timed out or cancelled copies
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    transfers: AtomicU64,
    bytes_transferred: AtomicU64,
    failures: AtomicU64,
}

/// Fetches objects into the local cache through an object store
#[derive(Debug, Clone)]
pub struct PartialFetcher {
    store: Arc<dyn ObjectStore>,
    cache: Arc<LocalCache>,
    config: FetchConfig,
    counters: Arc<Counters>,
}

impl PartialFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, cache: Arc<LocalCache>, config: FetchConfig) -> Self {
        Self {
            store,
            cache,
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.cache
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Make `source` (or `range` of it) present at `dest`
    ///
    /// # Arguments
    ///
    /// * `source` - Remote URI of the object
    /// * `dest` - Local destination path
    /// * `range` - Byte range to copy, `None` for the whole object
    /// * `cancel` - Aborts a pending reservation or copy when triggered
    ///
    /// # Errors
    ///
    /// Returns `TransferError` carrying source, destination and range if the
    /// copy fails, times out or is cancelled. No temp file is left behind.
    pub async fn fetch(
        &self,
        source: &str,
        dest: &Path,
        range: Option<ByteRange>,
        cancel: &CancellationToken,
    ) -> TransferResult<PathBuf> {
        let fail = |kind: TransferFailure| TransferError::new(source, dest, range, kind);

        if self.cache.exists(dest) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!("Using cached {}", dest.display());
            return Ok(dest.to_path_buf());
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(fail(TransferFailure::Cancelled)),
            status = self.cache.check_and_reserve(dest) => status,
        };

        let _guard = match status {
            ReservationStatus::AlreadyExists => {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!("Using cached {}", dest.display());
                return Ok(dest.to_path_buf());
            }
            ReservationStatus::Reserved(guard) => guard,
        };

        self.cache
            .prepare(dest)
            .await
            .map_err(|e| fail(TransferFailure::Cache(e)))?;

        let temp_path = self.cache.temp_path(dest);
        match range {
            Some(range) => debug!("Fetching bytes {} of {}", range, source),
            None => debug!("Fetching {}", source),
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransferFailure::Cancelled),
            result = tokio::time::timeout(
                self.config.timeout,
                self.store.copy(source, &temp_path, range),
            ) => match result {
                Ok(copied) => copied,
                Err(_) => Err(TransferFailure::Timeout {
                    seconds: self.config.timeout.as_secs(),
                }),
            },
        };

        match outcome {
            Ok(bytes) => {
                if let Err(e) = self.cache.commit(&temp_path, dest).await {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    return Err(fail(TransferFailure::Cache(e)));
                }
                self.counters.transfers.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .bytes_transferred
                    .fetch_add(bytes, Ordering::Relaxed);
                info!("Fetched {} bytes of {}", bytes, source);
                Ok(dest.to_path_buf())
            }
            Err(kind) => {
                self.cache.discard(&temp_path).await;
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                let error = fail(kind);
                warn!("{}", error);
                Err(error)
            }
        }
    }

    /// Size of the remote object in bytes
    pub async fn size(&self, source: &str) -> TransferResult<u64> {
        self.store
            .size(source)
            .await
            .map_err(|kind| TransferError::new(source, PathBuf::new(), None, kind))
    }

    pub fn stats(&self) -> FetchStats {
        FetchStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            transfers: self.counters.transfers.load(Ordering::Relaxed),
            bytes_transferred: self.counters.bytes_transferred.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

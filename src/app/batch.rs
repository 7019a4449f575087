//! Concurrent download of many fields
//!
//! Requests are independent: each gets its own [`Reader`] with the request's
//! product and region, so no mutable reader state is shared between tasks.
//! Requests that share a forecast file share its index file, and the local
//! cache ensures that index is fetched only once.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::catalog::ProductCatalog;
use crate::app::fetcher::PartialFetcher;
use crate::app::models::DownloadRequest;
use crate::app::reader::Reader;
use crate::constants::workers;
use crate::errors::Result;

/// Result of one request in a batch
pub type BatchOutcome = (DownloadRequest, Result<PathBuf>);

/// Batch behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum number of requests in flight
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: workers::DEFAULT_CONCURRENCY,
        }
    }
}

/// Counts over a finished batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Failures a retry might fix
    pub recoverable: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[BatchOutcome]) -> Self {
        let mut summary = Self::default();
        for (_, result) in outcomes {
            match result {
                Ok(_) => summary.succeeded += 1,
                Err(e) => {
                    summary.failed += 1;
                    if e.is_recoverable() {
                        summary.recoverable += 1;
                    }
                }
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Runs download requests concurrently through a shared fetcher
#[derive(Debug, Clone)]
pub struct BatchDownloader {
    catalog: Arc<ProductCatalog>,
    fetcher: PartialFetcher,
    max_concurrent: usize,
}

impl BatchDownloader {
    /// `max_concurrent` is clamped to `1..=MAX_CONCURRENCY`
    pub fn new(catalog: Arc<ProductCatalog>, fetcher: PartialFetcher, config: BatchConfig) -> Self {
        let max_concurrent = config.max_concurrent.clamp(1, workers::MAX_CONCURRENCY);
        if max_concurrent != config.max_concurrent {
            warn!(
                "Concurrency {} out of range, using {}",
                config.max_concurrent, max_concurrent
            );
        }
        Self {
            catalog,
            fetcher,
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Download every request, at most `max_concurrent` at a time
    ///
    /// Outcomes are returned in request order. A failed request does not
    /// stop the others; cancelling `cancel` stops all of them.
    pub async fn download_all(
        &self,
        requests: Vec<DownloadRequest>,
        cancel: &CancellationToken,
    ) -> Vec<BatchOutcome> {
        info!(
            "Starting batch of {} requests with concurrency {}",
            requests.len(),
            self.max_concurrent
        );

        let mut outcomes: Vec<(usize, BatchOutcome)> =
            stream::iter(requests.into_iter().enumerate())
                .map(|(position, request)| async move {
                    let result = self.download_one(&request, cancel).await;
                    if let Err(e) = &result {
                        error!("{} failed [{}]: {}", request, e.category(), e);
                    }
                    (position, (request, result))
                })
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;

        outcomes.sort_by_key(|(position, _)| *position);
        let outcomes: Vec<BatchOutcome> =
            outcomes.into_iter().map(|(_, outcome)| outcome).collect();

        let summary = BatchSummary::from_outcomes(&outcomes);
        let stats = self.fetcher.stats();
        info!(
            "Batch complete: {} succeeded, {} failed ({} recoverable); \
             {} transfers, {} cache hits, {} bytes",
            summary.succeeded,
            summary.failed,
            summary.recoverable,
            stats.transfers,
            stats.cache_hits,
            stats.bytes_transferred
        );

        let cleaned = self.fetcher.cache().cleanup_idle_reservations().await;
        if cleaned > 0 {
            info!("Released {} idle reservations", cleaned);
        }

        outcomes
    }

    async fn download_one(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let reader = Reader::for_request(&self.catalog, request, self.fetcher.clone())?;
        reader.download(request, cancel).await
    }
}

//! Prelude module for GRIB Fetcher Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use grib_fetcher::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use grib_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load(None).await?;
//!     let catalog = Arc::new(config.load_catalog().await?);
//!     let (client, fetch, batch, cache) = config.to_runtime_config();
//!
//!     let store = Arc::new(HttpObjectStore::new(client)?);
//!     let fetcher = PartialFetcher::new(store, Arc::new(LocalCache::new(cache)), fetch);
//!     let downloader = BatchDownloader::new(catalog, fetcher, batch);
//!
//!     let issue = parse_timestamp("2024-09-05T12:00Z")?;
//!     let valid = parse_timestamp("2024-09-05T13:00Z")?;
//!     let request =
//!         DownloadRequest::new("NBM", issue, valid, "RAIN1HR", "/tmp/grib").with_region("CO");
//!
//!     let cancel = CancellationToken::new();
//!     for (request, result) in downloader.download_all(vec![request], &cancel).await {
//!         println!("{}: {:?}", request, result);
//!     }
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    // Orchestration
    BatchConfig,
    BatchDownloader,
    BatchSummary,
    Reader,

    // Fetching and storage
    CacheConfig,
    ClientConfig,
    FetchConfig,
    HttpObjectStore,
    LocalCache,
    ObjectStore,
    PartialFetcher,

    // Catalog and data types
    ByteRange,
    DownloadRequest,
    FieldCriteria,
    ForecastTimes,
    ProductCatalog,
    ProductDefinition,
    Region,

    parse_timestamp,
};

// Configuration
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::products::NBM;

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

// Common external crate re-exports for convenience
pub use tokio;
pub use tokio_util::sync::CancellationToken;

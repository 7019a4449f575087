//! Core application logic for GRIB Fetcher
//!
//! This module contains the product catalog, path resolution, index parsing,
//! byte-range resolution, the local cache, object-store access, and the
//! reader and batch downloader that tie them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chrono::{TimeZone, Utc};
//! use grib_fetcher::app::{
//!     ClientConfig, FetchConfig, HttpObjectStore, LocalCache, PartialFetcher, ProductCatalog,
//!     Reader,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(HttpObjectStore::new(ClientConfig::default())?);
//! let cache = Arc::new(LocalCache::default());
//! let fetcher = PartialFetcher::new(store, cache, FetchConfig::default());
//!
//! let mut reader = Reader::new(&ProductCatalog::builtin()?, "NBM", fetcher)?;
//! reader.set_region("CO")?;
//!
//! let issue = Utc.with_ymd_and_hms(2024, 9, 5, 12, 0, 0).unwrap();
//! let valid = Utc.with_ymd_and_hms(2024, 9, 5, 13, 0, 0).unwrap();
//! let path = reader
//!     .download_field(
//!         issue,
//!         valid,
//!         "RAIN1HR",
//!         std::path::Path::new("/tmp/grib"),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! println!("Field saved to {}", path.display());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod cache;
pub mod catalog;
pub mod fetcher;
pub mod index;
pub mod models;
pub mod paths;
pub mod range;
pub mod reader;
pub mod store;

// Re-export main public API
pub use batch::{BatchConfig, BatchDownloader, BatchOutcome, BatchSummary};
pub use cache::{CacheConfig, CacheStats, LocalCache, ReservationGuard, ReservationStatus};
pub use catalog::{FieldCriteria, ProductCatalog, ProductDefinition, Region};
pub use fetcher::{FetchConfig, FetchStats, PartialFetcher};
pub use index::{find_match, parse as parse_index, read_index_file, IndexRecord};
pub use models::{parse_timestamp, DownloadRequest, ForecastTimes};
pub use paths::{FileVariant, PathResolver, PathTemplate};
pub use range::ByteRange;
pub use reader::Reader;
pub use store::{ClientConfig, HttpObjectStore, ObjectStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        let config = ClientConfig::default();
        assert!(config.tcp_nodelay);
        assert_eq!(ProductCatalog::builtin().unwrap().product_names(), vec!["NBM"]);
    }
}

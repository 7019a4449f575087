//! Local file cache with reservations and atomic operations
//!
//! The cache guarantees two things to the fetcher:
//!
//! - **Reservation system**: at most one in-flight fetch per destination path;
//!   later callers wait, then find the finished file
//! - **Atomic operations**: files are written to a temp path and renamed, so a
//!   destination that exists is always complete
//!
//! # Module Organization
//!
//! - [`config`] - Configuration types and defaults
//! - [`reservation`] - Per-path reservation guards
//! - [`stats`] - Reservation statistics
//! - [`manager`] - The cache itself
//!
//! # Examples
//!
//! ```rust,no_run
//! use grib_fetcher::app::cache::{LocalCache, ReservationStatus};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = LocalCache::default();
//! let dest = Path::new("/tmp/NBM_20240905T120000Z_20240905T130000Z.co.grib2.idx");
//!
//! match cache.check_and_reserve(dest).await {
//!     ReservationStatus::AlreadyExists => println!("File already cached"),
//!     ReservationStatus::Reserved(_guard) => {
//!         let temp = cache.temp_path(dest);
//!         tokio::fs::write(&temp, b"1:0:d=2024090512:APCP:surface:0-1 hour acc fcst:\n").await?;
//!         cache.commit(&temp, dest).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod reservation;
pub mod stats;

// Re-export main public API
pub use config::CacheConfig;
pub use manager::LocalCache;
pub use reservation::{ReservationGuard, ReservationStatus};
pub use stats::CacheStats;

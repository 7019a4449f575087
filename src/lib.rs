//! GRIB Fetcher Library
//!
//! A Rust library for downloading individual fields from remotely stored
//! GRIB2 forecast files. Each file's `.idx` index locates the requested
//! field's message, and only that byte range is transferred. Downloads are
//! cached on local disk and can run concurrently.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

//! Application constants for GRIB Fetcher
//!
//! This module centralizes constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("GRIB-Fetcher/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 16;
}

/// Rate limiting and retry configuration for the HTTP object store
pub mod limits {
    /// Default rate limit for object-store requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 20;

    /// Maximum retry attempts for throttled or failed requests
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 500;

    /// Maximum backoff delay (seconds)
    pub const MAX_BACKOFF_SECS: u64 = 30;

    /// Upper bound accepted for the configured retry count
    pub const MAX_RETRIES_LIMIT: u32 = 10;
}

/// Object store addressing
pub mod store {
    /// URI scheme of S3 object locations
    pub const S3_SCHEME: &str = "s3";

    /// Public (unsigned) virtual-hosted S3 endpoint suffix
    pub const S3_PUBLIC_HOST_SUFFIX: &str = "s3.amazonaws.com";
}

/// File naming constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Suffix appended to the effective extension of index files
    pub const INDEX_SUFFIX: &str = ".idx";

    /// Compact, lexically sortable timestamp format used in local filenames
    pub const COMPACT_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";
}

/// Index file format
pub mod index {
    /// Column separator
    pub const SEPARATOR: char = ':';

    /// Minimum number of columns in a record line
    pub const MIN_COLUMNS: usize = 7;
}

/// Concurrency configuration
pub mod workers {
    use super::Duration;

    /// Default number of concurrent field downloads
    pub const DEFAULT_CONCURRENCY: usize = 4;

    /// Maximum recommended concurrent downloads
    pub const MAX_CONCURRENCY: usize = 32;

    /// Default timeout for a single fetch
    pub const FETCH_TIMEOUT: Duration = Duration::from_secs(600);
}

/// Built-in product definitions
pub mod products {
    /// National Blend of Models
    pub const NBM: &str = "NBM";

    /// Public bucket holding NBM GRIB2 output
    pub const NBM_BASE_URI: &str = "s3://noaa-nbm-grib2-pds";
}


//! Error types for GRIB Fetcher
//!
//! This module defines the error taxonomy for every stage of a field download:
//! catalog/configuration validation, index parsing and matching, object-store
//! transfers and the local cache. Errors carry enough context (product, field,
//! paths, byte range) for a caller to decide what to do next.

use std::path::PathBuf;

use thiserror::Error;

use crate::app::range::ByteRange;

/// Configuration and catalog errors
///
/// These are raised before any I/O takes place.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Product name not present in the catalog
    #[error("Product {product} is not a supported product. Supported products: {supported:?}")]
    UnknownProduct {
        product: String,
        supported: Vec<String>,
    },

    /// Field name not defined for the product
    #[error("Field {field} not recognized for product {product}. Supported fields: {supported:?}")]
    UnknownField {
        product: String,
        field: String,
        supported: Vec<String>,
    },

    /// Region code not supported by the product
    #[error("Region {region} is not one of the regions for product {product}: {supported:?}")]
    UnknownRegion {
        product: String,
        region: String,
        supported: Vec<String>,
    },

    /// Product defined twice in a catalog
    #[error("Duplicate product definition: {product}")]
    DuplicateProduct { product: String },

    /// Field defined twice for one product
    #[error("Duplicate field {field} in product {product}")]
    DuplicateField { product: String, field: String },

    /// Path template could not be parsed or uses an unknown placeholder
    #[error("Invalid path template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// Valid time precedes issuance time
    #[error("Valid time {valid} is before issuance time {issued}")]
    NegativeLead { issued: String, valid: String },

    /// Timestamp could not be parsed as ISO-8601
    #[error("Invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Index file reading and field matching errors
#[derive(Error, Debug)]
pub enum IndexError {
    /// No record in a well-formed index file matched the field's criteria
    #[error("Cannot find field {field} in index file at {index_path}")]
    FieldNotFound { field: String, index_path: PathBuf },

    /// Index file could not be read
    #[error("Failed to read index file {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Offset of the following record does not lie after the matched one
    #[error("Index record {sequence} starts at byte {start} but the next record starts at {next}")]
    NonIncreasingOffsets { sequence: usize, start: u64, next: u64 },

    /// Record handed to the resolver does not belong to the record list
    #[error("Index record {sequence} is not part of the parsed index")]
    UnknownRecord { sequence: usize },
}

/// What went wrong during a transfer
#[derive(Error, Debug)]
pub enum TransferFailure {
    /// Source object does not exist
    #[error("object not found (HTTP 404)")]
    NotFound,

    /// Access to the source object was refused
    #[error("permission denied (HTTP {status})")]
    PermissionDenied { status: u16 },

    /// Requested range lies outside the object
    #[error("requested range not satisfiable (HTTP 416)")]
    RangeNotSatisfiable,

    /// Remote store returned an unexpected status
    #[error("server returned HTTP {status}")]
    Http { status: u16 },

    /// Rate limit exceeded after retries
    #[error("rate limit exceeded (HTTP 429)")]
    RateLimited,

    /// Network or protocol failure
    #[error("network error: {0}")]
    Network(String),

    /// Source URI cannot be mapped to a fetchable location
    #[error("invalid source URI: {reason}")]
    InvalidUri { reason: String },

    /// Remote store did not report an object size
    #[error("object size unavailable")]
    SizeUnavailable,

    /// Transfer exceeded the configured timeout
    #[error("timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Caller cancelled the transfer
    #[error("cancelled")]
    Cancelled,

    /// Local file I/O failed
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Destination could not be prepared or committed
    #[error("local cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Object-store copy or size failure, with the attempted transfer attached
#[derive(Error, Debug)]
#[error(
    "Transfer of {source_uri} to {} (range {}) failed: {kind}",
    .destination.display(),
    range_label(.range)
)]
pub struct TransferError {
    pub source_uri: String,
    pub destination: PathBuf,
    pub range: Option<ByteRange>,
    #[source]
    pub kind: TransferFailure,
}

fn range_label(range: &Option<ByteRange>) -> String {
    match range {
        Some(range) => range.to_string(),
        None => "full object".to_string(),
    }
}

impl TransferError {
    /// Attach transfer context to a failure
    pub fn new(
        source_uri: impl Into<String>,
        destination: impl Into<PathBuf>,
        range: Option<ByteRange>,
        kind: TransferFailure,
    ) -> Self {
        Self {
            source_uri: source_uri.into(),
            destination: destination.into(),
            range,
            kind,
        }
    }

    /// Check if retrying the same transfer may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            TransferFailure::Network(_)
                | TransferFailure::Timeout { .. }
                | TransferFailure::RateLimited
                | TransferFailure::Http { status: 500..=599 }
        )
    }
}

/// Local cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache directory not found or inaccessible
    #[error("Cache directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Cached file does not match what the remote store holds.
    ///
    /// Reserved: presence of a destination file is currently trusted as-is.
    #[error("Cached file {path} is inconsistent: {reason}")]
    Inconsistent { path: PathBuf, reason: String },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration or catalog error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Index parsing or matching error
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Object-store transfer error
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    ///
    /// Nothing is retried automatically; callers use this to decide.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Transfer(e) => e.is_transient(),
            AppError::Config(_) | AppError::Index(_) => false,
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Index(IndexError::FieldNotFound { .. }) => "not_found",
            AppError::Index(_) => "index",
            AppError::Transfer(_) => "transfer",
            AppError::Cache(_) => "cache",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Index result type alias
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Transfer result type alias
pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_not_found_names_field_and_path() {
        let error = AppError::from(IndexError::FieldNotFound {
            field: "RAIN1HR".to_string(),
            index_path: PathBuf::from("/tmp/NBM.co.grib2.idx"),
        });

        let message = error.to_string();
        assert!(message.contains("RAIN1HR"));
        assert!(message.contains("/tmp/NBM.co.grib2.idx"));
        assert_eq!(error.category(), "not_found");
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_transfer_error_context() {
        let error = TransferError::new(
            "s3://bucket/key",
            "/tmp/out.grib2",
            Some(ByteRange::bounded(10, 20).unwrap()),
            TransferFailure::Timeout { seconds: 5 },
        );

        let message = error.to_string();
        assert!(message.contains("s3://bucket/key"));
        assert!(message.contains("/tmp/out.grib2"));
        assert!(message.contains("10..20"));
        assert!(error.is_transient());

        let app_error = AppError::from(error);
        assert_eq!(app_error.category(), "transfer");
        assert!(app_error.is_recoverable());
    }

    #[test]
    fn test_permanent_transfer_failures() {
        let error = TransferError::new(
            "s3://bucket/key",
            "/tmp/out.grib2",
            None,
            TransferFailure::NotFound,
        );
        assert!(!error.is_transient());
        assert!(error.to_string().contains("full object"));

        let cancelled = TransferError::new("a", "b", None, TransferFailure::Cancelled);
        assert!(!cancelled.is_transient());
    }

    #[test]
    fn test_config_error_category() {
        let error = AppError::from(ConfigError::UnknownField {
            product: "NBM".to_string(),
            field: "NOPE".to_string(),
            supported: vec!["TEMP".to_string()],
        });
        assert_eq!(error.category(), "config");
        assert!(error.to_string().contains("NOPE"));
    }
}

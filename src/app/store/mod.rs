//! Object-store access
//!
//! The fetcher talks to remote storage only through the [`ObjectStore`]
//! trait: copy an object (or a byte range of it) to a local file, and report
//! an object's size. [`HttpObjectStore`] implements it over HTTP(S) for public
//! S3 buckets; tests substitute their own implementation.
//!
//! - `config`: HTTP client configuration and building
//! - `http`: rate-limited, retrying HTTP implementation

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use url::Url;

use crate::app::range::ByteRange;
use crate::constants::store;
use crate::errors::TransferFailure;

pub mod config;
pub mod http;

pub use config::ClientConfig;
pub use http::HttpObjectStore;

/// Remote storage capable of whole-object and ranged copies
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Copy `source` (or `range` of it) into the file at `dest`, creating or
    /// truncating it. Returns the number of bytes written.
    async fn copy(
        &self,
        source: &str,
        dest: &Path,
        range: Option<ByteRange>,
    ) -> Result<u64, TransferFailure>;

    /// Size of the object at `source` in bytes
    async fn size(&self, source: &str) -> Result<u64, TransferFailure>;
}

/// Map a source URI to the HTTP(S) URL it is fetched from
///
/// `s3://bucket/key` becomes `https://bucket.s3.amazonaws.com/key`, or
/// `{endpoint}/bucket/key` when a path-style endpoint is configured.
/// `http` and `https` URIs are used as-is.
pub fn object_url(source: &str, s3_endpoint: Option<&str>) -> Result<Url, TransferFailure> {
    let invalid = |reason: String| TransferFailure::InvalidUri { reason };

    let url = Url::parse(source).map_err(|e| invalid(format!("{}: {}", source, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme if scheme == store::S3_SCHEME => {
            let bucket = url
                .host_str()
                .filter(|host| !host.is_empty())
                .ok_or_else(|| invalid(format!("{} has no bucket", source)))?;
            let key = url.path().trim_start_matches('/');
            if key.is_empty() {
                return Err(invalid(format!("{} has no object key", source)));
            }

            let mapped = match s3_endpoint {
                Some(endpoint) => {
                    format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
                }
                None => format!(
                    "https://{}.{}/{}",
                    bucket,
                    store::S3_PUBLIC_HOST_SUFFIX,
                    key
                ),
            };
            Url::parse(&mapped).map_err(|e| invalid(format!("{}: {}", mapped, e)))
        }
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_uri_maps_to_public_endpoint() {
        let url = object_url(
            "s3://noaa-nbm-grib2-pds/blend.20240905/12/core/blend.t12z.core.f001.co.grib2",
            None,
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            concat!(
                "https://noaa-nbm-grib2-pds.s3.amazonaws.com/",
                "blend.20240905/12/core/blend.t12z.core.f001.co.grib2"
            )
        );
    }

    #[test]
    fn test_s3_uri_with_custom_endpoint() {
        let url = object_url("s3://bucket/a/b.idx", Some("http://localhost:9000/")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/bucket/a/b.idx");
    }

    #[test]
    fn test_http_uri_passthrough() {
        let url = object_url("https://example.com/x.grib2", Some("http://ignored")).unwrap();
        assert_eq!(url.as_str(), "https://example.com/x.grib2");
    }

    #[test]
    fn test_invalid_uris() {
        for source in ["not a uri", "ftp://host/file", "s3://bucket", "s3://bucket/"] {
            assert!(
                matches!(
                    object_url(source, None),
                    Err(TransferFailure::InvalidUri { .. })
                ),
                "{} should be rejected",
                source
            );
        }
    }
}

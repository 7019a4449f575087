//! Field download orchestration
//!
//! A [`Reader`] is bound to one product and, optionally, one region. For each
//! requested field it makes the shared index file present locally, finds the
//! field's message in it, works out the message's byte range and fetches only
//! those bytes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::catalog::{ProductCatalog, ProductDefinition, Region};
use crate::app::fetcher::PartialFetcher;
use crate::app::index;
use crate::app::models::{DownloadRequest, ForecastTimes};
use crate::app::paths::{FileVariant, PathResolver};
use crate::app::range;
use crate::errors::{ConfigError, ConfigResult, IndexError, Result};

/// Downloads individual fields of one product
#[derive(Debug, Clone)]
pub struct Reader {
    product: Arc<ProductDefinition>,
    region: Option<Region>,
    fetcher: PartialFetcher,
}

impl Reader {
    /// Create a reader for `product` with no region selected
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownProduct` if the catalog lacks the product
    pub fn new(
        catalog: &ProductCatalog,
        product: &str,
        fetcher: PartialFetcher,
    ) -> ConfigResult<Self> {
        Ok(Self {
            product: catalog.lookup(product)?,
            region: None,
            fetcher,
        })
    }

    /// Reader configured for the product and region of `request`
    pub fn for_request(
        catalog: &ProductCatalog,
        request: &DownloadRequest,
        fetcher: PartialFetcher,
    ) -> ConfigResult<Self> {
        let mut reader = Self::new(catalog, &request.product, fetcher)?;
        if let Some(code) = &request.region {
            reader.set_region(code)?;
        }
        Ok(reader)
    }

    /// Select a region; it changes the extension of every path
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownRegion` and leaves the current region
    /// unchanged if the product does not offer `code`
    pub fn set_region(&mut self, code: &str) -> ConfigResult<()> {
        let region = self.product.region(code)?;
        debug!("{} region set to {}", self.product.name(), region);
        self.region = Some(region);
        Ok(())
    }

    /// Go back to the product's default (region-less) files
    pub fn clear_region(&mut self) {
        self.region = None;
    }

    pub fn product(&self) -> &ProductDefinition {
        &self.product
    }

    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    pub fn fetcher(&self) -> &PartialFetcher {
        &self.fetcher
    }

    /// Path resolver for the current product and region
    pub fn resolver(&self) -> PathResolver<'_> {
        PathResolver::new(&self.product, self.region.as_ref())
    }

    /// Download one field into `dest_dir`, returning the local data path
    ///
    /// The index file is stored without a field suffix and reused by every
    /// field of the same forecast file. Both downloads are skipped when their
    /// destination already exists.
    ///
    /// # Errors
    ///
    /// - `ConfigError` for an unknown field or a valid time before issuance,
    ///   raised before any I/O
    /// - `IndexError::FieldNotFound` if the index has no matching record
    /// - `TransferError` from either fetch
    pub async fn download_field(
        &self,
        issue: DateTime<Utc>,
        valid: DateTime<Utc>,
        field: &str,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let criteria = self.product.field_criteria(field)?;
        let times = ForecastTimes::new(issue, valid)?;
        let resolver = self.resolver();

        info!(
            "Downloading {} for {} issued {} valid {}",
            field,
            self,
            issue.format("%Y-%m-%dT%H:%MZ"),
            valid.format("%Y-%m-%dT%H:%MZ")
        );

        let index_source = resolver.remote_uri(&times, FileVariant::Index);
        let index_path = resolver.local_path(dest_dir, &times, None, FileVariant::Index);
        self.fetcher
            .fetch(&index_source, &index_path, None, cancel)
            .await?;

        let records = index::read_index_file(&index_path).await?;
        let matched =
            index::find_match(&records, criteria).ok_or_else(|| IndexError::FieldNotFound {
                field: field.to_string(),
                index_path: index_path.clone(),
            })?;
        let byte_range = range::resolve(&records, matched)?;
        debug!(
            "{} is message {} at bytes {}",
            field, matched.message, byte_range
        );

        let data_source = resolver.remote_uri(&times, FileVariant::Data);
        let data_path = resolver.local_path(dest_dir, &times, Some(field), FileVariant::Data);
        let path = self
            .fetcher
            .fetch(&data_source, &data_path, Some(byte_range), cancel)
            .await?;

        Ok(path)
    }

    /// Run [`Reader::download_field`] for an explicit request
    ///
    /// The request's region applies to this call only; the reader's own
    /// region is not consulted or changed.
    ///
    /// # Errors
    ///
    /// In addition to those of `download_field`, returns
    /// `ConfigError::UnknownProduct` if the request names another product
    pub async fn download(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if request.product != self.product.name() {
            return Err(ConfigError::UnknownProduct {
                product: request.product.clone(),
                supported: vec![self.product.name().to_string()],
            }
            .into());
        }

        let scoped = Reader {
            product: self.product.clone(),
            region: match &request.region {
                Some(code) => Some(self.product.region(code)?),
                None => None,
            },
            fetcher: self.fetcher.clone(),
        };

        scoped
            .download_field(
                request.issue,
                request.valid,
                &request.field,
                &request.dest_dir,
                cancel,
            )
            .await
    }
}

impl fmt::Display for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.product.name())?;
        if let Some(region) = &self.region {
            write!(f, " ({})", region)?;
        }
        write!(f, " at {}", self.product.base_uri())
    }
}

//! Data models for GRIB Fetcher
//!
//! This module defines the request type handed to the reader and batch
//! downloader, the forecast time triple (issuance, valid, lead) that drives
//! path templating, and timestamp parsing for caller-supplied times.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, ConfigResult};

/// Issuance and valid time of a forecast, with the lead between them
///
/// Construction guarantees `valid >= issue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForecastTimes {
    issue: DateTime<Utc>,
    valid: DateTime<Utc>,
}

impl ForecastTimes {
    /// # Errors
    ///
    /// Returns `ConfigError::NegativeLead` if `valid` precedes `issue`
    pub fn new(issue: DateTime<Utc>, valid: DateTime<Utc>) -> ConfigResult<Self> {
        if valid < issue {
            return Err(ConfigError::NegativeLead {
                issued: issue.to_rfc3339(),
                valid: valid.to_rfc3339(),
            });
        }
        Ok(Self { issue, valid })
    }

    pub fn issue(&self) -> DateTime<Utc> {
        self.issue
    }

    pub fn valid(&self) -> DateTime<Utc> {
        self.valid
    }

    pub fn lead(&self) -> Duration {
        self.valid - self.issue
    }

    /// Lead in whole hours, truncated
    pub fn lead_hours(&self) -> i64 {
        self.lead().num_hours()
    }
}

/// One field to download, fully described
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Product name in the catalog (e.g. `NBM`)
    pub product: String,
    /// Region code, `None` for the product's default files
    pub region: Option<String>,
    /// Forecast issuance time
    pub issue: DateTime<Utc>,
    /// Forecast valid time
    pub valid: DateTime<Utc>,
    /// Field name in the product definition
    pub field: String,
    /// Directory the index and data files are written to
    pub dest_dir: PathBuf,
}

impl DownloadRequest {
    pub fn new(
        product: impl Into<String>,
        issue: DateTime<Utc>,
        valid: DateTime<Utc>,
        field: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            product: product.into(),
            region: None,
            issue,
            valid,
            field: field.into(),
            dest_dir: dest_dir.into(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Validated forecast times of this request
    pub fn times(&self) -> ConfigResult<ForecastTimes> {
        ForecastTimes::new(self.issue, self.valid)
    }
}

impl fmt::Display for DownloadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.product)?;
        if let Some(region) = &self.region {
            write!(f, "/{}", region)?;
        }
        write!(
            f,
            " {} issued {} valid {}",
            self.field,
            self.issue.format("%Y-%m-%dT%H:%MZ"),
            self.valid.format("%Y-%m-%dT%H:%MZ")
        )
    }
}

/// Parse an ISO-8601 timestamp
///
/// Accepts RFC 3339 (with offset) as well as offset-less forms down to
/// `YYYY-MM-DDTHH`, which are taken as UTC. A trailing `Z` is allowed on
/// the short forms.
pub fn parse_timestamp(value: &str) -> ConfigResult<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = trimmed.trim_end_matches(['Z', 'z']);
    let padded = if naive.len() == "YYYY-MM-DDTHH".len() {
        format!("{}:00", naive)
    } else {
        naive.to_string()
    };

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&padded, format) {
            return Ok(Utc.from_utc_datetime(&parsed));
        }
    }

    Err(ConfigError::InvalidTimestamp {
        value: value.to_string(),
        reason: "expected ISO-8601, e.g. 2024-09-05T12:00:00Z".to_string(),
    })
}

//! GRIB2 index (`.idx`) parsing and field matching
//!
//! An index file has one line per GRIB message:
//!
//! ```text
//! 32:3866677:d=2024090523:TMP:2 m above ground:2 hour fcst:ens std dev
//! ```
//!
//! The columns are message number, starting byte offset, reference date,
//! variable abbreviation, level, time range and statistical processing
//! (empty when the message holds the plain deterministic field).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::catalog::FieldCriteria;
use crate::constants::index::{MIN_COLUMNS, SEPARATOR};
use crate::errors::{IndexError, IndexResult};

/// One parsed line of an index file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// 1-based line number in the index file
    pub sequence: usize,
    /// Message number column as written (may be `32` or `32.1`)
    pub message: String,
    /// Starting byte offset of the message
    pub offset: u64,
    /// Reference date column, e.g. `d=2024090523`
    pub reference_date: String,
    /// Variable abbreviation, e.g. `TMP`
    pub abbreviation: String,
    /// Level descriptor, e.g. `2 m above ground`
    pub level: String,
    /// Time range descriptor, e.g. `0-1 hour acc fcst`
    pub time_range: String,
    /// Statistical processing descriptor, empty when none
    pub statistical_processing: String,
}

impl IndexRecord {
    /// Parse a single index line; `None` if it is not a usable record
    pub fn parse_line(sequence: usize, line: &str) -> Option<Self> {
        let columns: Vec<&str> = line.split(SEPARATOR).take(MIN_COLUMNS).collect();
        if columns.len() < MIN_COLUMNS {
            return None;
        }

        let offset = columns[1].trim().parse::<u64>().ok()?;

        Some(Self {
            sequence,
            message: columns[0].to_string(),
            offset,
            reference_date: columns[2].to_string(),
            abbreviation: columns[3].to_string(),
            level: columns[4].to_string(),
            time_range: columns[5].to_string(),
            statistical_processing: columns[6].to_string(),
        })
    }

    /// Check whether this record is the field described by `criteria`
    ///
    /// Level and time-range criteria are string prefixes of their columns and
    /// match anything when absent. The statistical-processing column must be
    /// empty; there is no way to opt out of that check.
    pub fn matches(&self, criteria: &FieldCriteria) -> bool {
        let level_prefix = criteria
            .level
            .map(|level| level.to_string())
            .unwrap_or_default();
        let time_range_prefix = criteria
            .time_range_length
            .map(|length| length.to_string())
            .unwrap_or_default();

        self.abbreviation == criteria.abbreviation
            && self.level.starts_with(&level_prefix)
            && self.time_range.starts_with(&time_range_prefix)
            && self.statistical_processing.is_empty()
    }
}

/// Parse index file text into records, in file order
///
/// Lines with fewer than seven columns or a non-numeric offset are skipped.
pub fn parse(text: &str) -> Vec<IndexRecord> {
    let mut records = Vec::new();

    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match IndexRecord::parse_line(n + 1, line) {
            Some(record) => records.push(record),
            None => debug!("Skipping malformed index line {}: {:?}", n + 1, line),
        }
    }

    records
}

/// Read and parse an index file from disk
pub async fn read_index_file(path: &Path) -> IndexResult<Vec<IndexRecord>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| IndexError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let records = parse(&text);
    debug!(
        "Parsed {} records from index file {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// First record, in file order, matching `criteria`
pub fn find_match<'a>(
    records: &'a [IndexRecord],
    criteria: &FieldCriteria,
) -> Option<&'a IndexRecord> {
    records.iter().find(|record| record.matches(criteria))
}

//! Byte ranges of fields inside a GRIB2 object
//!
//! An index file lists where each message starts; a message ends where the
//! next one begins, and the last message runs to the end of the object.

use std::fmt;

use crate::app::index::IndexRecord;
use crate::errors::{IndexError, IndexResult};

/// Half-open byte span `[start, end)`; `end == None` means "to end of object"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    start: u64,
    end: Option<u64>,
}

impl ByteRange {
    /// Range from `start` through the end of the object
    pub fn to_end(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Range `[start, end)`, `None` if `end <= start`
    pub fn bounded(start: u64, end: u64) -> Option<Self> {
        (end > start).then_some(Self {
            start,
            end: Some(end),
        })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// Exclusive end offset, `None` when unbounded
    pub fn end(&self) -> Option<u64> {
        self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.end.is_none()
    }

    /// Number of bytes covered, if bounded
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end - self.start)
    }

    /// Inclusive last byte, the form HTTP Range and most object stores expect
    pub fn inclusive_end(&self) -> Option<u64> {
        self.end.map(|end| end - 1)
    }

    /// Render as an HTTP `Range` header value
    pub fn http_header(&self) -> String {
        match self.inclusive_end() {
            Some(last) => format!("bytes={}-{}", self.start, last),
            None => format!("bytes={}-", self.start),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}..{}", self.start, end),
            None => write!(f, "{}..", self.start),
        }
    }
}

/// Compute the byte range of `matched` within the object described by `records`
///
/// `records` must be the full parsed index in file order.
pub fn resolve(records: &[IndexRecord], matched: &IndexRecord) -> IndexResult<ByteRange> {
    let position = records
        .iter()
        .position(|record| record.sequence == matched.sequence)
        .ok_or(IndexError::UnknownRecord {
            sequence: matched.sequence,
        })?;

    let start = matched.offset;
    match records.get(position + 1) {
        None => Ok(ByteRange::to_end(start)),
        Some(next) => ByteRange::bounded(start, next.offset).ok_or(
            IndexError::NonIncreasingOffsets {
                sequence: matched.sequence,
                start,
                next: next.offset,
            },
        ),
    }
}

//! Shared fixtures for the integration tests
//!
//! [`MemoryStore`] serves objects from memory and records every copy, so tests
//! can assert exactly which transfers a download performed.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use grib_fetcher::app::{
    ByteRange, FetchConfig, LocalCache, ObjectStore, PartialFetcher, ProductCatalog, Reader,
};
use grib_fetcher::errors::TransferFailure;

pub const NBM_CO_INDEX_URI: &str =
    "s3://noaa-nbm-grib2-pds/blend.20240905/12/core/blend.t12z.core.f001.co.grib2.idx";
pub const NBM_CO_DATA_URI: &str =
    "s3://noaa-nbm-grib2-pds/blend.20240905/12/core/blend.t12z.core.f001.co.grib2";
pub const NBM_INDEX_URI: &str =
    "s3://noaa-nbm-grib2-pds/blend.20240905/12/core/blend.t12z.core.f001.grib2.idx";
pub const NBM_DATA_URI: &str =
    "s3://noaa-nbm-grib2-pds/blend.20240905/12/core/blend.t12z.core.f001.grib2";

/// In-memory object store that records copies
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    copies: Mutex<Vec<(String, Option<ByteRange>)>>,
    delay: Duration,
}

impl MemoryStore {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn insert(&self, uri: &str, bytes: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap()
            .insert(uri.to_string(), bytes.into());
    }

    pub fn copies(&self) -> Vec<(String, Option<ByteRange>)> {
        self.copies.lock().unwrap().clone()
    }

    pub fn copies_of(&self, uri: &str) -> usize {
        self.copies
            .lock()
            .unwrap()
            .iter()
            .filter(|(source, _)| source == uri)
            .count()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn copy(
        &self,
        source: &str,
        dest: &Path,
        range: Option<ByteRange>,
    ) -> Result<u64, TransferFailure> {
        self.copies
            .lock()
            .unwrap()
            .push((source.to_string(), range));
        tokio::time::sleep(self.delay).await;

        let object = self
            .objects
            .lock()
            .unwrap()
            .get(source)
            .cloned()
            .ok_or(TransferFailure::NotFound)?;

        let bytes = match range {
            Some(range) => {
                let start = range.start() as usize;
                if start >= object.len() {
                    return Err(TransferFailure::RangeNotSatisfiable);
                }
                let end = range
                    .end()
                    .map_or(object.len(), |end| (end as usize).min(object.len()));
                object[start..end].to_vec()
            }
            None => object,
        };

        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }

    async fn size(&self, source: &str) -> Result<u64, TransferFailure> {
        self.objects
            .lock()
            .unwrap()
            .get(source)
            .map(|object| object.len() as u64)
            .ok_or(TransferFailure::NotFound)
    }
}

/// One message of a synthetic forecast file
pub struct Message {
    pub abbreviation: &'static str,
    pub level: &'static str,
    pub time_range: &'static str,
    pub statistics: &'static str,
    pub payload: &'static [u8],
}

/// Messages of the sample forecast file, in file order
pub fn sample_messages() -> Vec<Message> {
    vec![
        Message {
            abbreviation: "APCP",
            level: "surface",
            time_range: "1 hour acc fcst",
            statistics: "ens std dev",
            payload: b"GRIB-rain-spread",
        },
        Message {
            abbreviation: "APCP",
            level: "surface",
            time_range: "1 hour acc fcst",
            statistics: "",
            payload: b"GRIB-rain-one-hour",
        },
        Message {
            abbreviation: "TMP",
            level: "2 m above ground",
            time_range: "1 hour fcst",
            statistics: "",
            payload: b"GRIB-temperature",
        },
        Message {
            abbreviation: "WIND",
            level: "10 m above ground",
            time_range: "1 hour fcst",
            statistics: "",
            payload: b"GRIB-wind-speed-last",
        },
    ]
}

/// Data bytes and index text for `messages`
pub fn build_forecast_file(messages: &[Message]) -> (Vec<u8>, String) {
    let mut data = Vec::new();
    let mut index = String::new();
    for (n, message) in messages.iter().enumerate() {
        index.push_str(&format!(
            "{}:{}:d=2024090512:{}:{}:{}:{}\n",
            n + 1,
            data.len(),
            message.abbreviation,
            message.level,
            message.time_range,
            message.statistics
        ));
        data.extend_from_slice(message.payload);
    }
    (data, index)
}

/// Store holding the sample file under the given data and index URIs
pub fn sample_store(data_uri: &str, index_uri: &str, delay: Duration) -> Arc<MemoryStore> {
    let (data, index) = build_forecast_file(&sample_messages());
    let store = Arc::new(MemoryStore::with_delay(delay));
    store.insert(data_uri, data);
    store.insert(index_uri, index);
    store
}

/// Issue 2024-09-05 12Z, valid one hour later
pub fn forecast_times() -> (DateTime<Utc>, DateTime<Utc>) {
    (
        Utc.with_ymd_and_hms(2024, 9, 5, 12, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 9, 5, 13, 0, 0).unwrap(),
    )
}

pub fn fetcher(store: Arc<MemoryStore>) -> PartialFetcher {
    PartialFetcher::new(store, Arc::new(LocalCache::default()), FetchConfig::default())
}

pub fn nbm_reader(store: Arc<MemoryStore>, region: Option<&str>) -> Reader {
    let catalog = ProductCatalog::builtin().unwrap();
    let mut reader = Reader::new(&catalog, "NBM", fetcher(store)).unwrap();
    if let Some(code) = region {
        reader.set_region(code).unwrap();
    }
    reader
}

/// Names of the entries in `dir`, sorted; empty if it does not exist
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

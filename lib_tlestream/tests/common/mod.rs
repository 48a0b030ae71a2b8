//! Shared in-memory upstream for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use lib_tlestream::configs::EngineConfig;
use lib_tlestream::retrieve::{CatalogSource, RecordSource};
use lib_tlestream::{TleError, TleResult};

/// A scriptable catalog + record source.
#[derive(Default)]
pub struct FakeSource {
    catalog: Mutex<Option<Vec<u8>>>,
    records: Mutex<HashMap<u32, Vec<String>>>,
    pub catalog_fetches: AtomicUsize,
    pub record_fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `csv` as the catalog; `None` makes catalog fetches fail.
    pub fn set_catalog(&self, csv: Option<&str>) {
        *self.catalog.lock().unwrap() = csv.map(|c| c.as_bytes().to_vec());
    }

    pub fn set_record(&self, object_id: u32, lines: &[&str]) {
        self.records
            .lock()
            .unwrap()
            .insert(object_id, lines.iter().map(|s| s.to_string()).collect());
    }

    pub fn remove_record(&self, object_id: u32) {
        self.records.lock().unwrap().remove(&object_id);
    }
}

impl CatalogSource for FakeSource {
    async fn fetch_catalog(&self) -> TleResult<Vec<u8>> {
        self.catalog_fetches.fetch_add(1, Ordering::SeqCst);
        self.catalog
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TleError::fetch("fake://satcat.csv", "simulated network error"))
    }
}

impl RecordSource for FakeSource {
    async fn fetch_record(&self, object_id: u32) -> TleResult<Vec<String>> {
        self.record_fetches.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .get(&object_id)
            .cloned()
            .ok_or_else(|| TleError::fetch(format!("fake://gp/{object_id}"), "simulated network error"))
    }
}

pub fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Engine config rooted in `dir` with short intervals.
pub fn test_config(dir: &std::path::Path) -> EngineConfig {
    EngineConfig {
        catalog_poll_interval: Duration::from_millis(50),
        record_poll_interval: Duration::from_millis(10),
        datastore_dir: dir.to_path_buf(),
        subscriber_buffer: 16,
        ..EngineConfig::default()
    }
}

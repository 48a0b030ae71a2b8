//! # Record Cache
//!
//! Persistent `object id → Record` store backed by one `<id>.tle` file per
//! object, fronted by an in-memory map of `Arc<Record>`.
//!
//! A `put` first lands the file through write-to-temp-then-rename and only then
//! swaps the in-memory `Arc`. Readers clone an `Arc` under a short read guard,
//! so they see either the whole old record or the whole new one. A failed write
//! leaves the previous value in place.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::catalog::store::write_atomically;
use crate::error::{TleError, TleResult};

/// File extension used for persisted records.
pub const RECORD_EXTENSION: &str = "tle";

/// One object's raw multi-line payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The object this record describes.
    pub object_id: u32,
    /// Payload lines, in order, without line terminators.
    pub lines: Vec<String>,
}

impl Record {
    /// On-disk text form.
    pub fn to_text(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }

    /// Splits fetched or stored text into lines; accepts `\n` and `\r\n`.
    pub fn lines_from_text(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }
}

/// # Record Cache
#[derive(Debug)]
pub struct RecordCache {
    dir: PathBuf,
    records: RwLock<BTreeMap<u32, Arc<Record>>>,
}

impl RecordCache {
    /// Opens (creating if needed) the datastore directory and loads every
    /// `<id>.tle` file already present.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut records = BTreeMap::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(object_id) = object_id_of(&path) else {
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(text) => {
                    let lines = Record::lines_from_text(&text);
                    records.insert(object_id, Arc::new(Record { object_id, lines }));
                }
                Err(e) => log::warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        log::info!("Record cache opened at {} with {} records", dir.display(), records.len());
        Ok(Self {
            dir,
            records: RwLock::new(records),
        })
    }

    /// The current record for `object_id`, if one was ever stored.
    pub fn get(&self, object_id: u32) -> Option<Arc<Record>> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&object_id)
            .cloned()
    }

    /// Atomically replaces the record for `object_id`.
    ///
    /// The file is written without holding the map lock. On failure the map is
    /// not touched and [`TleError::CacheWrite`] is returned.
    pub fn put(&self, object_id: u32, lines: Vec<String>) -> TleResult<Arc<Record>> {
        let record = Arc::new(Record { object_id, lines });
        write_atomically(&self.path_for(object_id), record.to_text().as_bytes())
            .map_err(|source| TleError::CacheWrite { object_id, source })?;

        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(object_id, Arc::clone(&record));
        Ok(record)
    }

    /// Every cached object id, ascending.
    pub fn known_ids(&self) -> Vec<u32> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    fn path_for(&self, object_id: u32) -> PathBuf {
        self.dir.join(format!("{object_id}.{RECORD_EXTENSION}"))
    }
}

fn object_id_of(path: &Path) -> Option<u32> {
    if path.extension()? != RECORD_EXTENSION {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn get_after_put_returns_the_written_value() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::open(dir.path()).unwrap();
        assert!(cache.get(42).is_none());

        cache.put(42, lines(&["L1", "L2"])).unwrap();
        assert_eq!(cache.get(42).unwrap().lines, lines(&["L1", "L2"]));

        cache.put(42, lines(&["L3"])).unwrap();
        assert_eq!(cache.get(42).unwrap().lines, lines(&["L3"]));
    }

    #[test]
    fn repeated_identical_put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::open(dir.path()).unwrap();
        cache.put(7, lines(&["A", "B"])).unwrap();
        cache.put(7, lines(&["A", "B"])).unwrap();
        assert_eq!(cache.get(7).unwrap().lines, lines(&["A", "B"]));
        assert_eq!(cache.known_ids(), vec![7]);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = RecordCache::open(dir.path()).unwrap();
            cache.put(300, lines(&["X"])).unwrap();
            cache.put(25544, lines(&["ISS (ZARYA)", "1 ...", "2 ..."])).unwrap();
            cache.put(5, Vec::new()).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("satcat.csv"), "ignored").unwrap();

        let cache = RecordCache::open(dir.path()).unwrap();
        assert_eq!(cache.known_ids(), vec![5, 300, 25544]);
        assert_eq!(cache.get(25544).unwrap().lines.len(), 3);
        assert!(cache.get(5).unwrap().lines.is_empty());
    }

    #[test]
    fn failed_write_keeps_the_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let store_dir = dir.path().join("store");
        let cache = RecordCache::open(&store_dir).unwrap();
        cache.put(42, lines(&["old"])).unwrap();

        // Replace the datastore directory with a plain file so writes fail.
        fs::remove_dir_all(&store_dir).unwrap();
        fs::write(&store_dir, "not a directory").unwrap();

        let err = cache.put(42, lines(&["new"])).unwrap_err();
        assert!(matches!(err, TleError::CacheWrite { object_id: 42, .. }));
        assert_eq!(cache.get(42).unwrap().lines, lines(&["old"]));
    }

    #[test]
    fn concurrent_readers_never_see_torn_records() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(RecordCache::open(dir.path()).unwrap());
        let old = lines(&["A1", "A2", "A3"]);
        let new = lines(&["B1", "B2", "B3", "B4"]);
        cache.put(1, old.clone()).unwrap();

        let writer = {
            let cache = Arc::clone(&cache);
            let (old, new) = (old.clone(), new.clone());
            thread::spawn(move || {
                for i in 0..200 {
                    let next = if i % 2 == 0 { new.clone() } else { old.clone() };
                    cache.put(1, next).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let (old, new) = (old.clone(), new.clone());
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let seen = cache.get(1).unwrap();
                        assert!(seen.lines == old || seen.lines == new, "torn read: {:?}", seen.lines);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}

//! # Catalog Store
//!
//! Holds the most recent complete catalog. Each refresh builds a brand new
//! [`CatalogSnapshot`] and swaps the shared `Arc`; readers clone the `Arc` and
//! work on an immutable snapshot, so they never observe a half-applied update.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::catalog::{parse_catalog, CatalogRow};
use crate::error::TleResult;

/// File name of the persisted raw catalog inside the datastore.
pub const CATALOG_FILE_NAME: &str = "satcat.csv";

/// An immutable, internally consistent view of the catalog.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    /// Parsed rows, in feed order.
    pub rows: Vec<CatalogRow>,
    /// The bytes the rows were parsed from.
    pub raw: Vec<u8>,
    /// When this snapshot was installed.
    pub fetched_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// Parses `raw` into a snapshot stamped with the current time.
    pub fn parse(raw: Vec<u8>) -> TleResult<Self> {
        let rows = parse_catalog(&raw)?;
        Ok(Self {
            rows,
            raw,
            fetched_at: Utc::now(),
        })
    }

    /// Ids of rows without a decay date, in feed order.
    pub fn live_object_ids(&self) -> Vec<u32> {
        self.rows
            .iter()
            .filter(|row| row.is_live())
            .map(|row| row.object_id)
            .collect()
    }
}

/// # Catalog Store
///
/// Written only by the catalog refresh loop, read by the selector and the
/// external interface.
#[derive(Debug, Default)]
pub struct CatalogStore {
    current: RwLock<Option<Arc<CatalogSnapshot>>>,
    persist_path: Option<PathBuf>,
}

impl CatalogStore {
    /// A purely in-memory store with no snapshot yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that mirrors every installed snapshot to `<dir>/satcat.csv` and
    /// seeds itself from that file when it already exists and parses.
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(CATALOG_FILE_NAME);
        let store = Self {
            current: RwLock::new(None),
            persist_path: Some(path.clone()),
        };

        match fs::read(&path) {
            Ok(raw) => match CatalogSnapshot::parse(raw) {
                Ok(snapshot) => {
                    log::info!(
                        "Seeded catalog from {} ({} rows)",
                        path.display(),
                        snapshot.rows.len()
                    );
                    store.swap(snapshot);
                }
                Err(e) => log::warn!("Ignoring stored catalog {}: {}", path.display(), e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not read stored catalog {}: {}", path.display(), e),
        }

        store
    }

    /// Parses `raw` and, only if that succeeds, replaces the whole snapshot.
    ///
    /// On error the previous snapshot stays in place untouched.
    pub fn replace(&self, raw: Vec<u8>) -> TleResult<Arc<CatalogSnapshot>> {
        let snapshot = CatalogSnapshot::parse(raw)?;
        if let Some(path) = &self.persist_path {
            if let Err(e) = write_atomically(path, &snapshot.raw) {
                log::error!("Failed to persist catalog to {}: {}", path.display(), e);
            }
        }
        Ok(self.swap(snapshot))
    }

    fn swap(&self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// The current snapshot, if any refresh has succeeded yet.
    pub fn snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Live ids from the current snapshot; empty when there is none.
    pub fn live_object_ids(&self) -> Vec<u32> {
        self.snapshot()
            .map(|s| s.live_object_ids())
            .unwrap_or_default()
    }
}

/// Write-to-temp-then-rename inside the target's own directory.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TleError;

    const TWO_OBJECTS: &[u8] = b"NORAD_CAT_ID,DECAY_DATE\n100,\n200,2001-03-23\n";

    #[test]
    fn live_ids_exclude_decayed_objects() {
        let store = CatalogStore::new();
        store.replace(TWO_OBJECTS.to_vec()).unwrap();
        assert_eq!(store.live_object_ids(), vec![100]);
    }

    #[test]
    fn empty_store_has_no_live_ids() {
        let store = CatalogStore::new();
        assert!(store.snapshot().is_none());
        assert!(store.live_object_ids().is_empty());
    }

    #[test]
    fn failed_replace_keeps_previous_snapshot() {
        let store = CatalogStore::new();
        let first = store.replace(TWO_OBJECTS.to_vec()).unwrap();

        let err = store.replace(b"garbage without columns".to_vec()).unwrap_err();
        assert!(matches!(err, TleError::CatalogParse(_)));

        let current = store.snapshot().unwrap();
        assert!(Arc::ptr_eq(&first, &current));
        assert_eq!(current.raw, TWO_OBJECTS);
    }

    #[test]
    fn replace_is_wholesale() {
        let store = CatalogStore::new();
        store.replace(TWO_OBJECTS.to_vec()).unwrap();
        store.replace(b"NORAD_CAT_ID,DECAY_DATE\n300,\n".to_vec()).unwrap();
        let ids: Vec<u32> = store.snapshot().unwrap().rows.iter().map(|r| r.object_id).collect();
        assert_eq!(ids, vec![300]);
    }

    #[test]
    fn persisted_catalog_seeds_a_reopened_store() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CatalogStore::open(dir.path());
            assert!(store.snapshot().is_none());
            store.replace(TWO_OBJECTS.to_vec()).unwrap();
        }
        assert!(dir.path().join(CATALOG_FILE_NAME).is_file());

        let reopened = CatalogStore::open(dir.path());
        assert_eq!(reopened.live_object_ids(), vec![100]);
    }
}

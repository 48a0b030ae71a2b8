//! # TLE Engine
//!
//! The facade the surrounding server talks to. It owns the catalog store, the
//! record cache and the subscriber registry, starts the two poll loops, and
//! exposes the read, refresh and subscribe operations.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::RecordCache;
use crate::catalog::{CatalogStore, Selector};
use crate::configs::EngineConfig;
use crate::core::registry::{SubscriberRegistry, Subscription};
use crate::error::{TleError, TleResult};
use crate::ingestors::{CatalogRefresher, RecordRefresher, RecordUpdater};
use crate::retrieve::{CatalogSource, RecordSource};

/// Join handles of the background loops started by [`TleEngine::spawn`].
pub struct EngineTasks {
    /// The catalog refresh loop.
    pub catalog: JoinHandle<()>,
    /// The record refresh loop.
    pub records: JoinHandle<()>,
}

impl EngineTasks {
    /// Waits for both loops to finish.
    pub async fn join(self) {
        for (name, handle) in [("catalog", self.catalog), ("record", self.records)] {
            if let Err(e) = handle.await {
                log::error!("{} poll task ended abnormally: {}", name, e);
            }
        }
    }
}

/// # TLE Engine
pub struct TleEngine<S> {
    config: EngineConfig,
    source: Arc<S>,
    catalog: Arc<CatalogStore>,
    cache: Arc<RecordCache>,
    registry: Arc<SubscriberRegistry>,
    updater: Arc<RecordUpdater<S>>,
}

impl<S> TleEngine<S>
where
    S: CatalogSource + RecordSource,
{
    /// Opens the datastore named in `config` and wires every component.
    ///
    /// Existing records and the last persisted catalog are loaded from disk.
    pub fn open(config: EngineConfig, source: S) -> std::io::Result<Self> {
        let cache = Arc::new(RecordCache::open(&config.datastore_dir)?);
        let catalog = Arc::new(CatalogStore::open(&config.datastore_dir));
        let registry = Arc::new(SubscriberRegistry::new(config.subscriber_buffer));
        let source = Arc::new(source);
        let updater = Arc::new(RecordUpdater::new(
            Arc::clone(&source),
            Arc::clone(&cache),
            Arc::clone(&registry),
        ));

        Ok(Self {
            config,
            source,
            catalog,
            cache,
            registry,
            updater,
        })
    }

    /// Starts the catalog and record loops; both stop when `shutdown` fires.
    pub fn spawn(&self, shutdown: CancellationToken) -> EngineTasks {
        let catalog = self.catalog_refresher();
        let records = self.record_refresher();

        EngineTasks {
            catalog: tokio::spawn(catalog.run(shutdown.clone())),
            records: tokio::spawn(records.run(shutdown)),
        }
    }

    /// A catalog loop bound to this engine's store and source.
    pub fn catalog_refresher(&self) -> CatalogRefresher<S> {
        CatalogRefresher::new(
            Arc::clone(&self.source),
            Arc::clone(&self.catalog),
            self.config.catalog_poll_interval,
        )
    }

    /// A record loop bound to this engine's catalog, cache and registry.
    pub fn record_refresher(&self) -> RecordRefresher<S> {
        RecordRefresher::new(
            Selector::new(Arc::clone(&self.catalog)),
            Arc::clone(&self.updater),
            self.config.record_poll_interval,
        )
    }

    /// Every object id currently in the record cache, ascending.
    pub fn list_known_ids(&self) -> Vec<u32> {
        self.cache.known_ids()
    }

    /// The cached record lines for `object_id`.
    pub fn get_record(&self, object_id: u32) -> TleResult<Vec<String>> {
        self.cache
            .get(object_id)
            .map(|record| record.lines.clone())
            .ok_or(TleError::NotFound(object_id))
    }

    /// Fetches, stores and (if changed) broadcasts `object_id` right now.
    ///
    /// Returns the fetched lines whether or not they changed. Errors are
    /// returned to the caller instead of being swallowed.
    pub async fn force_refresh(&self, object_id: u32) -> TleResult<Vec<String>> {
        let refreshed = self.updater.refresh(object_id).await?;
        if let Some(delivered) = refreshed.broadcast {
            log::info!(
                "Manual refresh of {} broadcast to {} subscribers",
                object_id,
                delivered
            );
        }
        Ok(refreshed.lines)
    }

    /// The raw bytes of the current catalog snapshot, if one exists.
    pub fn catalog_snapshot(&self) -> Option<Vec<u8>> {
        self.catalog.snapshot().map(|s| s.raw.clone())
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        self.registry.join()
    }

    /// Removes a subscriber; the handle is consumed.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.registry.leave(subscription.id());
    }

    /// The shared subscriber registry, for transports that report closes by id.
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// The shared catalog store.
    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    /// The upstream source shared by both loops.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }
}

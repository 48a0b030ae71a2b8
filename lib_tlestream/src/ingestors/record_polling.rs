//! # Record Polling Ingestor
//!
//! The short-period loop that keeps cached records fresh and feeds subscribers.
//!
//! ## Workflow (one tick):
//! 1.  **Select**: draw one live object id; an empty catalog skips the tick.
//! 2.  **Fetch**: pull the object's current record. No lock is held here.
//! 3.  **Compare**: read the cached record and run the change detector.
//! 4.  **Commit**: on change, persist the record, then broadcast a
//!     [`ChangeEvent`]. A record that failed to persist is never broadcast.
//! 5.  **Sleep**: wait for the interval or cancellation, whichever is first.
//!
//! Steps 3 and 4 run under a gate shared with manual refreshes, so two
//! writers never interleave their compare and commit for the same cache. Each
//! fetch takes a ticket before it starts; a fetch that finishes after a newer
//! one for the same object was already applied is discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cache::{has_changed, RecordCache};
use crate::catalog::Selector;
use crate::core::event::ChangeEvent;
use crate::core::registry::SubscriberRegistry;
use crate::error::{TleError, TleResult};
use crate::retrieve::RecordSource;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No live object to refresh.
    EmptyCatalog,
    /// The upstream fetch failed; nothing was mutated.
    FetchFailed {
        /// The object that was selected.
        object_id: u32,
    },
    /// A newer fetch of the same object was applied first; this one was dropped.
    Superseded {
        /// The object that was refreshed.
        object_id: u32,
    },
    /// The fetched record matched the cached one.
    Unchanged {
        /// The object that was refreshed.
        object_id: u32,
    },
    /// The record changed but could not be persisted; nothing was broadcast.
    CacheWriteFailed {
        /// The object that was refreshed.
        object_id: u32,
    },
    /// The record changed, was stored, and was broadcast.
    Updated {
        /// The object that was refreshed.
        object_id: u32,
        /// Number of subscribers the event reached.
        delivered: usize,
    },
}

/// Result of refreshing one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refreshed {
    /// The object's current lines: the fetched ones, or the newer cached
    /// ones when this fetch was superseded.
    pub lines: Vec<String>,
    /// `Some(delivered)` when a change was committed and broadcast.
    pub broadcast: Option<usize>,
    /// `true` when a newer fetch had already been applied.
    pub superseded: bool,
}

impl Refreshed {
    fn unchanged(lines: Vec<String>) -> Self {
        Self {
            lines,
            broadcast: None,
            superseded: false,
        }
    }
}

/// # Record Updater
///
/// Fetch, compare, commit and broadcast for one object id. Shared by the poll
/// loop and by manual refreshes.
pub struct RecordUpdater<R> {
    source: Arc<R>,
    cache: Arc<RecordCache>,
    registry: Arc<SubscriberRegistry>,
    next_ticket: AtomicU64,
    /// Last applied fetch ticket per object; held across compare and commit.
    gate: Mutex<HashMap<u32, u64>>,
}

impl<R: RecordSource> RecordUpdater<R> {
    /// Wires the updater to its source, cache, and registry.
    pub fn new(source: Arc<R>, cache: Arc<RecordCache>, registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            source,
            cache,
            registry,
            next_ticket: AtomicU64::new(0),
            gate: Mutex::new(HashMap::new()),
        }
    }

    /// Refreshes `object_id` now.
    ///
    /// Fetch and cache-write errors are returned; in both cases nothing is
    /// broadcast.
    pub async fn refresh(&self, object_id: u32) -> TleResult<Refreshed> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let lines = self.source.fetch_record(object_id).await?;

        let mut applied = self.gate.lock().await;
        if applied.get(&object_id).is_some_and(|&last| last > ticket) {
            log::debug!("Discarding superseded fetch of record {}", object_id);
            let current = self.cache.get(object_id).map_or(lines, |r| r.lines.clone());
            return Ok(Refreshed {
                lines: current,
                broadcast: None,
                superseded: true,
            });
        }

        let cached = self.cache.get(object_id);
        if !has_changed(cached.as_deref().map(|r| r.lines.as_slice()), &lines) {
            applied.insert(object_id, ticket);
            return Ok(Refreshed::unchanged(lines));
        }

        // The fsync runs on the blocking pool, not on a runtime worker.
        let cache = Arc::clone(&self.cache);
        let stored = lines.clone();
        tokio::task::spawn_blocking(move || cache.put(object_id, stored))
            .await
            .map_err(|e| TleError::CacheWrite {
                object_id,
                source: std::io::Error::other(e),
            })??;
        applied.insert(object_id, ticket);

        let event = ChangeEvent::now(object_id, lines.clone());
        log::info!("Record {} changed at {}", object_id, event.timestamp_iso());
        let delivered = self.registry.broadcast(event);

        Ok(Refreshed {
            lines,
            broadcast: Some(delivered),
            superseded: false,
        })
    }
}

/// # Record Refresher
///
/// The periodic loop around a [`Selector`] and a [`RecordUpdater`].
pub struct RecordRefresher<R> {
    selector: Selector,
    updater: Arc<RecordUpdater<R>>,
    interval: Duration,
}

impl<R: RecordSource> RecordRefresher<R> {
    /// Creates a refresher that ticks every `interval`.
    pub fn new(selector: Selector, updater: Arc<RecordUpdater<R>>, interval: Duration) -> Self {
        Self {
            selector,
            updater,
            interval,
        }
    }

    /// Runs one tick. Never fails; every error becomes an outcome.
    pub async fn tick(&self) -> TickOutcome {
        let object_id = match self.selector.select_one() {
            Ok(id) => id,
            Err(e) => {
                log::debug!("Skipping record tick: {}", e);
                return TickOutcome::EmptyCatalog;
            }
        };

        match self.updater.refresh(object_id).await {
            Ok(Refreshed {
                superseded: true, ..
            }) => TickOutcome::Superseded { object_id },
            Ok(Refreshed {
                broadcast: Some(delivered),
                ..
            }) => {
                log::debug!("Record {} broadcast to {} subscribers", object_id, delivered);
                TickOutcome::Updated {
                    object_id,
                    delivered,
                }
            }
            Ok(Refreshed { broadcast: None, .. }) => {
                log::debug!("Record {} unchanged", object_id);
                TickOutcome::Unchanged { object_id }
            }
            Err(e @ TleError::CacheWrite { .. }) => {
                log::error!("{}", e);
                TickOutcome::CacheWriteFailed { object_id }
            }
            Err(e) => {
                log::warn!("Record refresh for {} failed: {}", object_id, e);
                TickOutcome::FetchFailed { object_id }
            }
        }
    }

    /// # Main Execution Loop
    ///
    /// Ticks, then sleeps for the interval, until `shutdown` fires. An
    /// in-flight tick is allowed to finish.
    pub async fn run(self, shutdown: CancellationToken) {
        log::info!("Record poll started (every {}s)", self.interval.as_secs());

        loop {
            self.tick().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        log::info!("Record poll stopped.");
    }
}

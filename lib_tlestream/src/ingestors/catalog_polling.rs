//! # Catalog Polling Ingestor
//!
//! A self-scheduling loop that refreshes the [`CatalogStore`] from the
//! upstream catalog feed on a long, fixed interval.
//!
//! ## Key Design Principles:
//! - **Last-Known-Good**: a fetch or parse failure leaves the previous snapshot
//!   in place. The failure is logged and the next tick retries.
//! - **Never Exits on Error**: only the cancellation token ends the loop.
//! - **Cooperative Shutdown**: the sleep between ticks races the token, so the
//!   loop stops within one interval of cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogSnapshot, CatalogStore};
use crate::error::{TleError, TleResult};
use crate::retrieve::CatalogSource;

/// # Catalog Refresher
pub struct CatalogRefresher<C> {
    source: Arc<C>,
    store: Arc<CatalogStore>,
    interval: Duration,
}

impl<C: CatalogSource> CatalogRefresher<C> {
    /// Creates a refresher that feeds `store` from `source` every `interval`.
    pub fn new(source: Arc<C>, store: Arc<CatalogStore>, interval: Duration) -> Self {
        Self {
            source,
            store,
            interval,
        }
    }

    /// One fetch-and-replace cycle.
    ///
    /// On error the store is untouched.
    pub async fn refresh(&self) -> TleResult<Arc<CatalogSnapshot>> {
        let raw = self.source.fetch_catalog().await?;

        // Parsing and the fsync of a multi-megabyte file stay off the runtime workers.
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.replace(raw))
            .await
            .map_err(|e| TleError::CatalogParse(format!("catalog update did not complete: {e}")))?
    }

    /// # Main Execution Loop
    ///
    /// Refreshes immediately, then once per interval until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        log::info!("Catalog poll started (every {}s)", self.interval.as_secs());

        loop {
            match self.refresh().await {
                Ok(snapshot) => log::info!(
                    "Catalog refreshed: {} objects, {} live",
                    snapshot.rows.len(),
                    snapshot.live_object_ids().len()
                ),
                Err(e) => log::warn!("Catalog refresh failed, keeping previous snapshot: {}", e),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        log::info!("Catalog poll stopped.");
    }
}

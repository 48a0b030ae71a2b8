//! # Selector
//!
//! Picks the next object for the record refresh loop, uniformly at random
//! from the live subset of the current catalog snapshot.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::catalog::CatalogStore;
use crate::error::{TleError, TleResult};

/// Draws live object ids from a shared [`CatalogStore`].
#[derive(Debug, Clone)]
pub struct Selector {
    catalog: Arc<CatalogStore>,
}

impl Selector {
    /// Creates a selector over `catalog`.
    pub fn new(catalog: Arc<CatalogStore>) -> Self {
        Self { catalog }
    }

    /// One uniformly drawn live id, using the thread-local generator.
    pub fn select_one(&self) -> TleResult<u32> {
        self.select_one_with(&mut rand::rng())
    }

    /// One uniformly drawn live id, using the supplied generator.
    ///
    /// Returns [`TleError::EmptyCatalog`] when no live object exists.
    pub fn select_one_with<R: Rng + ?Sized>(&self, rng: &mut R) -> TleResult<u32> {
        let live = self.catalog.live_object_ids();
        live.choose(rng).copied().ok_or(TleError::EmptyCatalog)
    }
}

//! # Catalog Module
//!
//! The roster of tracked objects and the choice of which live object to
//! refresh next.
//!
//! ## Contained Modules:
//! - **`parser`**: CSV table → [`CatalogRow`]s.
//! - **`store`**: the snapshot-swapped [`CatalogStore`].
//! - **`selector`**: uniform random choice over the live subset.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use chrono::NaiveDate;

/// CSV table parsing.
pub mod parser;
/// Uniform selection of the next object to refresh.
pub mod selector;
/// The wholesale-replaced catalog snapshot holder.
pub mod store;

pub use parser::parse_catalog;
pub use selector::Selector;
pub use store::{CatalogSnapshot, CatalogStore};

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogRow {
    /// Stable, unique object identifier.
    pub object_id: u32,
    /// Reentry date; `None` while the object is still in orbit.
    pub decay_date: Option<NaiveDate>,
}

impl CatalogRow {
    /// A row with no decay date is live.
    pub fn is_live(&self) -> bool {
        self.decay_date.is_none()
    }
}

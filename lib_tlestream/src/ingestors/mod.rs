//! # Data Ingestors Module
//!
//! The two self-scheduling poll loops that pull upstream data into the engine.
//!
//! ## Contained Modules:
//! - **`catalog_polling`**: long-period refresh of the catalog snapshot.
//! - **`record_polling`**: short-period select → fetch → compare → commit →
//!   broadcast cycle, plus the updater shared with manual refreshes.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Periodic catalog refresh.
pub mod catalog_polling;
/// Periodic record refresh and change broadcast.
pub mod record_polling;

pub use catalog_polling::CatalogRefresher;
pub use record_polling::{RecordRefresher, RecordUpdater, Refreshed, TickOutcome};

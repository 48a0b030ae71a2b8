//! # Record Cache Module
//!
//! Storage of the latest record per object and the rule deciding when a new
//! fetch counts as a change.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Full-content comparison of old and new records.
pub mod change_detector;
/// Atomic, file-backed record storage.
pub mod record_cache;

pub use change_detector::has_changed;
pub use record_cache::{Record, RecordCache};

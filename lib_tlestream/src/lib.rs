//! # lib_tlestream
//!
//! A continuously refreshed local cache of TLE orbital element records, with
//! live change notifications.
//!
//! ## Modules
//!
//! - [`catalog`]: the catalog snapshot store and the uniform live-object selector.
//! - [`cache`]: the file-backed record cache and the change detector.
//! - [`core`]: change events, the subscriber registry and the [`TleEngine`] facade.
//! - [`ingestors`]: the catalog and record poll loops.
//! - [`retrieve`]: the retrying HTTP client and the upstream source traits.
//! - [`configs`]: engine configuration.
//! - [`error`]: the [`TleError`] taxonomy.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod cache;
pub mod catalog;
pub mod configs;
pub mod core;
pub mod error;
pub mod ingestors;
pub mod retrieve;

pub use crate::core::{ChangeEvent, SubscriberRegistry, Subscription, TleEngine};
pub use crate::error::{TleError, TleResult};

//! # Core Engine Module
//!
//! The heart of the TLE streaming engine: the change event, the subscriber
//! registry that fans it out, and the engine facade that ties the catalog,
//! cache, registry and poll loops together.
//!
//! ## Core Components:
//!
//! - **`event`**: the [`ChangeEvent`] payload pushed to subscribers.
//! - **`registry`**: the owned, concurrency-safe subscriber set with
//!   non-blocking, zero-copy fan-out.
//! - **`engine`**: [`TleEngine`], the operations exposed to the server.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The engine facade and background task startup.
pub mod engine;
/// The change event delivered to subscribers.
pub mod event;
/// Join / leave / broadcast over the live subscriber set.
pub mod registry;

pub use engine::{EngineTasks, TleEngine};
pub use event::ChangeEvent;
pub use registry::{SubscriberId, SubscriberRegistry, Subscription};

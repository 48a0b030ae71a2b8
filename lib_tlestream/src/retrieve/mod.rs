//! # Data Retrieval Module
//!
//! Everything that talks to the upstream catalog and record feeds.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: a generic HTTP `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`, with automatic retries and exponential backoff.
//! - **`source`**: the `CatalogSource` / `RecordSource` seams the poll loops
//!   depend on, and the `HttpSource` that implements them over `ky_http`.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Generic HTTP API client with retry middleware for resilient network requests.
pub mod ky_http;
/// Catalog and record source traits and their HTTP implementation.
pub mod source;

pub use ky_http::ApiClient;
pub use source::{CatalogSource, HttpSource, RecordSource};

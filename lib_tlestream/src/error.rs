//! # Engine Error Taxonomy
//!
//! Every failure the streaming engine can observe is one of the variants below.
//! The poll loops log and swallow all of them; only the synchronous
//! `force_refresh` path hands them back to a caller.

use thiserror::Error;

/// Errors raised by the catalog, cache, and retrieval layers.
#[derive(Debug, Error)]
pub enum TleError {
    /// A catalog or record source was unreachable or answered with a
    /// non-success status.
    #[error("Fetch from {url} failed: {reason}")]
    TransientFetch {
        /// The URL that was requested.
        url: String,
        /// Transport error text or the HTTP status line.
        reason: String,
    },

    /// The catalog feed could not be turned into rows.
    #[error("Catalog parse error: {0}")]
    CatalogParse(String),

    /// There are no live objects to choose from.
    #[error("Catalog has no live objects")]
    EmptyCatalog,

    /// A record could not be persisted to the datastore.
    #[error("Failed to persist record {object_id}: {source}")]
    CacheWrite {
        /// The object whose record failed to persist.
        object_id: u32,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// No record has ever been cached for this object.
    #[error("No record cached for object {0}")]
    NotFound(u32),
}

impl TleError {
    /// Builds a [`TleError::TransientFetch`] from anything printable.
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        TleError::TransientFetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias used across the crate.
pub type TleResult<T> = Result<T, TleError>;

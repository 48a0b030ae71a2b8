//! # Engine Configuration
//!
//! Runtime knobs for the streaming engine. The binary builds one of these from
//! its merged CLI / env / file configuration; tests build them directly.

use std::path::PathBuf;
use std::time::Duration;

/// Default catalog feed.
pub const DEFAULT_CATALOG_URL: &str = "https://celestrak.org/pub/satcat.csv";
/// Default record feed. `{id}` is replaced by the object id.
pub const DEFAULT_RECORD_URL_TEMPLATE: &str =
    "https://celestrak.org/NORAD/elements/gp.php?CATNR={id}";
/// Placeholder substituted in [`EngineConfig::record_url_template`].
pub const RECORD_ID_PLACEHOLDER: &str = "{id}";

/// # Engine Config
///
/// Intervals, upstream locations and local storage for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Period of the catalog refresh loop.
    pub catalog_poll_interval: Duration,
    /// URL of the full catalog CSV.
    pub catalog_url: String,
    /// Period of the record refresh loop.
    pub record_poll_interval: Duration,
    /// URL template for a single record; must contain `{id}`.
    pub record_url_template: String,
    /// Directory holding `<id>.tle` files and the raw catalog.
    pub datastore_dir: PathBuf,
    /// Per-subscriber channel capacity before the subscriber counts as unresponsive.
    pub subscriber_buffer: usize,
    /// Timeout applied to every upstream HTTP request.
    pub http_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog_poll_interval: Duration::from_secs(3600),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            record_poll_interval: Duration::from_secs(60),
            record_url_template: DEFAULT_RECORD_URL_TEMPLATE.to_string(),
            datastore_dir: PathBuf::from("./datastore"),
            subscriber_buffer: 64,
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Expands the record URL template for one object.
    pub fn record_url(&self, object_id: u32) -> String {
        self.record_url_template
            .replace(RECORD_ID_PLACEHOLDER, &object_id.to_string())
    }
}

//! # Upstream Sources
//!
//! The two external feeds the engine depends on, as traits, plus the HTTP
//! implementation used in production. Tests substitute in-memory sources.

use std::future::Future;

use crate::cache::Record;
use crate::configs::EngineConfig;
use crate::error::TleResult;
use crate::retrieve::ky_http::ApiClient;

/// Supplies the full catalog table.
pub trait CatalogSource: Send + Sync + 'static {
    /// Fetches the raw catalog bytes.
    fn fetch_catalog(&self) -> impl Future<Output = TleResult<Vec<u8>>> + Send;
}

/// Supplies one object's current record.
pub trait RecordSource: Send + Sync + 'static {
    /// Fetches the current record lines for `object_id`.
    fn fetch_record(&self, object_id: u32) -> impl Future<Output = TleResult<Vec<String>>> + Send;
}

/// # HTTP Source
///
/// Celestrak-style feeds: one CSV URL for the catalog and one URL template,
/// containing `{id}`, for records.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: ApiClient,
    config: EngineConfig,
}

impl HttpSource {
    /// Builds the source and its retrying client from `config`.
    pub fn new(config: EngineConfig) -> TleResult<Self> {
        let client = ApiClient::new(config.http_timeout)?;
        Ok(Self { client, config })
    }
}

impl CatalogSource for HttpSource {
    async fn fetch_catalog(&self) -> TleResult<Vec<u8>> {
        let response = self.client.get(&self.config.catalog_url).await?;
        log::debug!(
            "Fetched catalog ({} bytes, {})",
            response.body.len(),
            response.status
        );
        Ok(response.body)
    }
}

impl RecordSource for HttpSource {
    async fn fetch_record(&self, object_id: u32) -> TleResult<Vec<String>> {
        let url = self.config.record_url(object_id);
        let response = self.client.get(&url).await?;
        Ok(Record::lines_from_text(&response.text()))
    }
}

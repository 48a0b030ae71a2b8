//! # HTTP Retrieval Utilities
//!
//! A small asynchronous client wrapper around `reqwest`, with middleware-based
//! exponential backoff retries for transient failures. Both upstream feeds are
//! plain text, so responses are returned as raw bytes or text.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use url::Url;

use crate::error::{TleError, TleResult};

/// Maximum number of automatic retries per request.
pub const MAX_RETRIES: u32 = 3;

/// A successful (2xx) response body plus its status.
#[derive(Debug)]
pub struct ApiResponse {
    /// The numeric HTTP status code.
    pub status: StatusCode,
    /// The raw body.
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// # Api Client
///
/// Built on `reqwest_middleware`; every GET goes through the retry policy, and
/// anything that is still not a 2xx afterwards becomes
/// [`TleError::TransientFetch`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: ClientWithMiddleware,
}

impl ApiClient {
    /// Creates a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> TleResult<Self> {
        let base = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tlestream/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TleError::fetch("<client>", e))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);
        let inner = ClientBuilder::new(base)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { inner })
    }

    /// Performs a GET and returns the body of a successful response.
    pub async fn get(&self, url: &str) -> TleResult<ApiResponse> {
        let parsed = Url::parse(url).map_err(|e| TleError::fetch(url, e))?;

        let response = self
            .inner
            .get(parsed)
            .send()
            .await
            .map_err(|e| TleError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TleError::fetch(url, format!("HTTP status {status}")));
        }

        let body = response.bytes().await.map_err(|e| TleError::fetch(url, e))?;
        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}

//! HTTP provider source backed by `reqwest`.
//!
//! Fetches signed dump URLs and hands the response body to the uploader as a
//! byte stream. Any status the provider answers with is returned as-is; only
//! failures that never produced a status are errors.
//!
//! There is no total request timeout: dumps can take arbitrarily long to
//! stream. A connection that goes quiet for longer than the read timeout
//! fails the body stream instead.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use thiserror::Error;

use dump_mirror_storage::{BodyStream, ProviderError, ProviderResponse, ProviderSource};

/// Default time allowed to establish a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default idle time allowed between reads of the response.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors constructing the HTTP provider.
#[derive(Error, Debug)]
pub enum HttpProviderError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// `ProviderSource` that issues plain GET requests.
#[derive(Debug, Clone)]
pub struct HttpProviderSource {
    client: reqwest::Client,
}

impl HttpProviderSource {
    /// Create a provider source.
    ///
    /// # Arguments
    /// * `connect_timeout` - Time allowed to establish a connection
    /// * `read_timeout` - Idle time allowed between reads, reset by every
    ///   chunk received
    pub fn new(
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, HttpProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(concat!("dump-mirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpProviderError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProviderSource for HttpProviderSource {
    async fn fetch(&self, url: &str) -> Result<ProviderResponse, ProviderError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            tracing::debug!(url, error = %e, "Provider request failed before a response");
            ProviderError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        let status: u16 = response.status().as_u16();
        let body: BodyStream = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
        Ok(ProviderResponse::new(status, body))
    }
}

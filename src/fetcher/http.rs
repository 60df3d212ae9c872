//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests to the Place Details API:
//! - Building the HTTP client with timeouts and a user agent string
//! - Issuing GET requests and reading the body
//! - Classifying failures into a uniform `TransportError`
//!
//! No retries happen here; callers decide whether a failure ends the run.

use crate::config::{ClientConfig, ImportConfig};
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

/// A network-level failure (connection, timeout, non-2xx status, unreadable body)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn timed_out(after_secs: u64) -> Self {
        Self::new(format!("Request timed out after {}s", after_secs))
    }
}

/// Issues GET requests and returns the response body
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `client` - The client identification used for the user agent
/// * `import` - Timing settings (request and connect timeouts)
///
/// # Example
///
/// ```no_run
/// use review_importer::config::{ClientConfig, ImportConfig};
/// use review_importer::fetcher::build_http_client;
///
/// let client = build_http_client(&ClientConfig::default(), &ImportConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    client: &ClientConfig,
    import: &ImportConfig,
) -> Result<Client, reqwest::Error> {
    // Format: Name/Version
    let user_agent = format!("{}/{}", client.name, client.version);

    Client::builder()
        .user_agent(user_agent)
        .timeout(import.request_timeout())
        .connect_timeout(import.connect_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// `HttpFetcher` backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(
        client: &ClientConfig,
        import: &ImportConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(client, import)?))
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(format!("HTTP {}", status)));
        }

        response.text().await.map_err(classify_reqwest_error)
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::new("Request timeout")
    } else if e.is_connect() {
        TransportError::new(format!("Connection failed: {}", e))
    } else if e.is_body() || e.is_decode() {
        TransportError::new(format!("Failed to read response body: {}", e))
    } else {
        TransportError::new(e.to_string())
    }
}

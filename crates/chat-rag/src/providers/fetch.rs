//! Webpage fetch trait and a reqwest-backed implementation

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::{Error, Result};

/// Raw response of a page fetch
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for fetching a URL
///
/// Transport failures are errors; non-2xx responses are returned as pages and
/// judged by the caller.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// HTTP fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::fetch(url, "request timed out")
            } else {
                Error::fetch(url, e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::fetch(url, format!("failed to read body: {}", e)))?;

        Ok(FetchedPage { status, body })
    }
}

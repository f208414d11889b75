//! Page fetching seam.
//!
//! Extraction and expiry checks only see fetched pages, never the network.

use async_trait::async_trait;

use crate::error::Result;
use crate::utils::http::fetch_text_async;

/// A fetched page: final status code and decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches pages by URL, following redirects.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// `PageFetcher` backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        log::debug!("Fetching {}", url);
        let (status, body) = fetch_text_async(&self.client, url).await?;
        Ok(FetchedPage { status, body })
    }
}

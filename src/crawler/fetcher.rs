//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made on behalf of the crawl:
//! - Building HTTP clients bound to an egress route (optional SOCKS5 proxy)
//! - GET requests for directory and entity pages under a load timeout
//! - Error classification into timeout, network and status failures

use crate::egress::EgressRoute;
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A successfully loaded page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Page body
    pub html: String,

    /// Final URL after redirects
    pub final_url: String,
}

/// Why a page could not be loaded
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("page load timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("fetch failed: {0}")]
    Other(String),
}

/// Loads pages for the crawl controller
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Loads `url`, giving up after `timeout`
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

/// Builds a fetcher for each egress session
pub trait FetcherFactory: Send + Sync {
    fn build(&self, route: &EgressRoute) -> Result<Arc<dyn PageFetcher>, HarvestError>;
}

/// Builds an HTTP client routed through `proxy` when one is given
///
/// # Arguments
///
/// * `user_agent` - User-Agent header sent with every request
/// * `proxy` - Proxy URL such as `socks5://10.64.0.1:1080`
/// * `page_timeout` - Overall request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client or parse the proxy
pub fn build_http_client(
    user_agent: &str,
    proxy: Option<&str>,
    page_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(page_timeout)
        .connect_timeout(Duration::from_secs(15))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

/// Page fetcher backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url).send().await.map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(classify_error)?;

        Ok(FetchedPage { html, final_url })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        match tokio::time::timeout(timeout, self.get(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }
}

fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() || e.is_request() {
        FetchError::Network(e.to_string())
    } else if let Some(status) = e.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Other(e.to_string())
    }
}

/// Builds an [`HttpFetcher`] per egress route
#[derive(Debug, Clone)]
pub struct HttpFetcherFactory {
    user_agent: String,
    page_timeout: Duration,
}

impl HttpFetcherFactory {
    pub fn new(user_agent: impl Into<String>, page_timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            page_timeout,
        }
    }
}

impl FetcherFactory for HttpFetcherFactory {
    fn build(&self, route: &EgressRoute) -> Result<Arc<dyn PageFetcher>, HarvestError> {
        let client = build_http_client(&self.user_agent, route.proxy.as_deref(), self.page_timeout)?;
        Ok(Arc::new(HttpFetcher::new(client)))
    }
}

//! Page client contract and its HTTP implementation
//!
//! A `PageClient` opens page contexts; a `PageContext` navigates to a URL
//! within a timeout and hands back the loaded document. Extraction then runs
//! over the loaded page without touching the network.

use crate::config::{Config, SourceConfig};
use crate::crawler::extractor::LevelExtractor;
use crate::region::ChildRecord;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::Html;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised while loading a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// The retry budget ran out
    #[error("Gave up on {url} after {attempts} attempt(s): {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Returns true if another attempt may succeed
    ///
    /// | Condition | Transient |
    /// |-----------|-----------|
    /// | Timeout | yes |
    /// | Navigation error | yes |
    /// | HTTP 5xx, 408, 429 | yes |
    /// | Other HTTP status | no |
    /// | Invalid URL | no |
    /// | Exhausted | no |
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Navigation { .. } => true,
            Self::Status { status, .. } => {
                *status >= 500
                    || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || *status == StatusCode::REQUEST_TIMEOUT.as_u16()
            }
            Self::InvalidUrl { .. } | Self::Exhausted { .. } => false,
        }
    }

    /// The URL the failure belongs to
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Navigation { url, .. }
            | Self::Status { url, .. }
            | Self::InvalidUrl { url, .. }
            | Self::Exhausted { url, .. } => url,
        }
    }
}

/// A page whose document has finished loading
#[derive(Debug, Clone)]
pub struct LoadedPage {
    /// Final URL after redirects; relative links resolve against it
    pub url: Url,

    /// Decoded document body
    pub html: String,
}

impl LoadedPage {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }

    /// Runs a level extractor over the loaded document
    pub fn evaluate(&self, extractor: LevelExtractor) -> Vec<ChildRecord> {
        let document = Html::parse_document(&self.html);
        extractor.extract(&document, &self.url)
    }
}

/// Opens page contexts
#[async_trait]
pub trait PageClient: Send + Sync {
    type Context: PageContext;

    /// Opens a fresh context for one node's fetch
    async fn open(&self) -> Result<Self::Context, FetchError>;
}

/// A single page session
#[async_trait]
pub trait PageContext: Send {
    /// Loads `url`, failing with `FetchError::Timeout` after `timeout`
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<LoadedPage, FetchError>;

    /// Releases the context
    async fn close(&mut self);
}

/// Builds the shared HTTP client
///
/// # Example
///
/// ```no_run
/// use division_harvester::config::SourceConfig;
/// use division_harvester::crawler::build_http_client;
///
/// let client = build_http_client(&SourceConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &SourceConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `PageClient` backed by plain HTTP requests
///
/// The directory is static HTML, so no rendering engine is needed. A
/// request for a visible session is accepted and ignored.
#[derive(Debug, Clone)]
pub struct HttpPageClient {
    client: Client,
    encoding: String,
    headless: bool,
}

impl HttpPageClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        if !config.crawler.headless {
            tracing::debug!("HTTP page client has no visible mode; pages load headless");
        }

        Ok(Self {
            client: build_http_client(&config.source)?,
            encoding: config.source.encoding.clone(),
            headless: config.crawler.headless,
        })
    }
}

#[async_trait]
impl PageClient for HttpPageClient {
    type Context = HttpPageContext;

    async fn open(&self) -> Result<HttpPageContext, FetchError> {
        tracing::trace!("Opening page context (headless={})", self.headless);
        Ok(HttpPageContext {
            client: self.client.clone(),
            encoding: self.encoding.clone(),
            navigations: 0,
        })
    }
}

/// One HTTP page session
#[derive(Debug)]
pub struct HttpPageContext {
    client: Client,
    encoding: String,
    navigations: u32,
}

#[async_trait]
impl PageContext for HttpPageContext {
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<LoadedPage, FetchError> {
        self.navigations += 1;

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();

        // Declared charset wins; the configured one is only a fallback
        let html = response
            .text_with_charset(&self.encoding)
            .await
            .map_err(|e| classify_error(url, e))?;

        Ok(LoadedPage::new(final_url, html))
    }

    async fn close(&mut self) {
        tracing::trace!("Closing page context after {} navigation(s)", self.navigations);
    }
}

fn classify_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Navigation {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

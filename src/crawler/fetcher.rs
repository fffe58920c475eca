//! Retrying page fetcher
//!
//! Wraps a `PageClient` with a bounded retry loop:
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Timeout / navigation error / HTTP 5xx, 408, 429 | Retry after a fixed delay |
//! | Other HTTP status, invalid URL | Fail immediately |
//! | `max_attempts` transient failures | Fail with `FetchError::Exhausted` |
//!
//! A page that loads but contains no rows is a success with zero records.

use crate::config::CrawlerConfig;
use crate::crawler::client::{FetchError, LoadedPage, PageClient, PageContext};
use crate::crawler::extractor::LevelExtractor;
use crate::region::ChildRecord;
use std::time::Duration;
use url::Url;

/// Attempt budget and timing for one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.retry_delay(),
            timeout: config.timeout(),
        }
    }
}

/// Fetches a listing page and extracts its child records
pub struct RetryingFetcher<C> {
    client: C,
    policy: RetryPolicy,
}

impl<C: PageClient> RetryingFetcher<C> {
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Loads `url` in a fresh page context and runs `extractor` over it
    ///
    /// # Returns
    ///
    /// * `Ok(records)` - The page loaded; `records` may be empty
    /// * `Err(FetchError)` - A permanent failure, or `Exhausted` once the
    ///   retry budget is spent
    pub async fn fetch(
        &self,
        url: &str,
        extractor: LevelExtractor,
    ) -> Result<Vec<ChildRecord>, FetchError> {
        let target = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let mut context = self.client.open().await?;
        let loaded = self.navigate_with_retry(&mut context, &target).await;
        context.close().await;

        let page = loaded?;
        let records = page.evaluate(extractor);
        tracing::debug!("Extracted {} {} row(s) from {}", records.len(), extractor.level(), url);
        Ok(records)
    }

    async fn navigate_with_retry(
        &self,
        context: &mut C::Context,
        url: &Url,
    ) -> Result<LoadedPage, FetchError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match context.navigate(url, self.policy.timeout).await {
                Ok(page) => return Ok(page),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= self.policy.max_attempts => {
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "Attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        self.policy.max_attempts,
                        e,
                        self.policy.delay
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }
    }
}

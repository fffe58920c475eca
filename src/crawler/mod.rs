//! Crawler module for expanding the division hierarchy
//!
//! This module contains the core crawling logic, including:
//! - The page client contract and its HTTP implementation
//! - Per-level extraction of child rows from listing pages
//! - Fetching with bounded retries
//! - Batch-barrier concurrency over a level's frontier
//! - Overall crawl coordination

mod batcher;
mod client;
mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod persist;

#[cfg(test)]
mod testing;

pub use batcher::{BatchRun, ConcurrencyBatcher};
pub use client::{
    build_http_client, FetchError, HttpPageClient, HttpPageContext, LoadedPage, PageClient,
    PageContext,
};
pub use coordinator::{
    CrawlPhase, CrawlReport, Coordinator, LevelReport, NodeFailure, NodeOutcome,
};
pub use extractor::{LevelExtractor, MUNICIPAL_DISTRICT};
pub use fetcher::{RetryPolicy, RetryingFetcher};
pub use frontier::select_frontier;
pub use persist::{persist_children, PersistSummary};

use crate::config::Config;
use crate::storage::SqliteRegionStore;
use crate::HarvestError;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Runs a complete crawl against the configured directory and database
///
/// Opens the SQLite store at `output.database_path`, fetches over HTTP,
/// and expands every level down to `crawler.depth`.
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The run finished; check `failed_nodes()`
/// * `Err(HarvestError)` - The run aborted
pub async fn crawl(config: Config) -> Result<CrawlReport, HarvestError> {
    let store = SqliteRegionStore::new(Path::new(&config.output.database_path))?;
    let client = HttpPageClient::new(&config)?;

    let mut coordinator = Coordinator::new(config, client, Arc::new(Mutex::new(store)))?;
    coordinator.run().await
}

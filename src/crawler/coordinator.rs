//! Crawler coordinator - level-by-level crawl orchestration
//!
//! A run walks the hierarchy top-down:
//! - Seeds provinces from the single index page
//! - For each deeper level permitted by `depth`, selects the frontier of
//!   unexpanded parents and expands it in batches
//! - Records the run in the `runs` ledger on every exit path
//!
//! The coordinator holds no retry logic; it only sequences the frontier
//! selector, the batcher, the fetcher and the persist task.

use crate::config::{compute_config_hash, Config};
use crate::crawler::batcher::ConcurrencyBatcher;
use crate::crawler::client::{FetchError, PageClient};
use crate::crawler::extractor::LevelExtractor;
use crate::crawler::fetcher::{RetryPolicy, RetryingFetcher};
use crate::crawler::frontier::select_frontier;
use crate::crawler::persist::{persist_children, PersistSummary};
use crate::region::{Expansion, Level, RegionNode};
use crate::storage::{RegionStore, RunStatus, StorageError};
use crate::HarvestError;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Where a run is in the level sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    ExpandingProvinces,
    ExpandingCities,
    ExpandingDistricts,
    ExpandingTowns,
    Done,
}

impl CrawlPhase {
    /// Level whose rows this phase creates
    pub fn target_level(&self) -> Option<Level> {
        match self {
            Self::Idle | Self::Done => None,
            Self::ExpandingProvinces => Some(Level::Province),
            Self::ExpandingCities => Some(Level::City),
            Self::ExpandingDistricts => Some(Level::District),
            Self::ExpandingTowns => Some(Level::Town),
        }
    }

    /// The phase that follows this one when crawling down to `depth`
    pub fn next(&self, depth: Level) -> Self {
        let candidate = match self {
            Self::Idle => Self::ExpandingProvinces,
            Self::ExpandingProvinces => Self::ExpandingCities,
            Self::ExpandingCities => Self::ExpandingDistricts,
            Self::ExpandingDistricts => Self::ExpandingTowns,
            Self::ExpandingTowns | Self::Done => Self::Done,
        };

        match candidate.target_level() {
            Some(level) if level <= depth => candidate,
            _ => Self::Done,
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ExpandingProvinces => "expanding provinces",
            Self::ExpandingCities => "expanding cities",
            Self::ExpandingDistricts => "expanding districts",
            Self::ExpandingTowns => "expanding towns",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of one node's fetch-extract-persist task
#[derive(Debug)]
pub enum NodeOutcome {
    Expanded {
        code: String,
        summary: PersistSummary,
    },
    Failed {
        code: String,
        error: FetchError,
    },
}

/// A node left unexpanded by a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub code: String,
    pub url: String,
    pub error: String,
}

/// Per-level tally of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelReport {
    /// Level whose rows were created
    pub level: Level,

    /// Pages queued for this level
    pub frontier: usize,

    /// Pages fetched and persisted
    pub expanded: usize,

    pub failed: Vec<NodeFailure>,

    /// Pages not attempted because the pass halted early
    pub skipped: usize,

    /// Child records extracted
    pub found: u64,

    /// Child records newly inserted
    pub inserted: u64,
}

impl LevelReport {
    fn new(level: Level, frontier: usize) -> Self {
        Self {
            level,
            frontier,
            expanded: 0,
            failed: Vec::new(),
            skipped: 0,
            found: 0,
            inserted: 0,
        }
    }

    fn record_expanded(&mut self, summary: &PersistSummary) {
        self.expanded += 1;
        self.found += u64::from(summary.found);
        self.inserted += u64::from(summary.inserted);
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub run_id: i64,
    pub year: u16,
    pub depth: Level,
    pub levels: Vec<LevelReport>,

    /// Last phase reached
    pub phase: CrawlPhase,
}

impl CrawlReport {
    fn new(run_id: i64, year: u16, depth: Level) -> Self {
        Self {
            run_id,
            year,
            depth,
            levels: Vec::new(),
            phase: CrawlPhase::Idle,
        }
    }

    pub fn failed_nodes(&self) -> usize {
        self.levels.iter().map(|l| l.failed.len()).sum()
    }

    pub fn inserted(&self) -> u64 {
        self.levels.iter().map(|l| l.inserted).sum()
    }

    pub fn level(&self, level: Level) -> Option<&LevelReport> {
        self.levels.iter().find(|l| l.level == level)
    }

    /// Fails with `HarvestError::Incomplete` if any node was left unexpanded
    pub fn ensure_complete(&self) -> Result<(), HarvestError> {
        match self.failed_nodes() {
            0 => Ok(()),
            failed => Err(HarvestError::Incomplete { failed }),
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator<C: PageClient, S: RegionStore> {
    config: Arc<Config>,
    store: Arc<Mutex<S>>,
    fetcher: RetryingFetcher<C>,
    batcher: ConcurrencyBatcher,
    config_hash: String,
}

impl<C: PageClient, S: RegionStore> Coordinator<C, S> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The resolved run configuration
    /// * `client` - Page client used for every fetch
    /// * `store` - Region store shared with the caller
    pub fn new(config: Config, client: C, store: Arc<Mutex<S>>) -> Result<Self, HarvestError> {
        let config_hash = compute_config_hash(&config)?;
        let fetcher = RetryingFetcher::new(client, RetryPolicy::from_config(&config.crawler));
        let batcher = ConcurrencyBatcher::from_config(&config.crawler);

        Ok(Self {
            config: Arc::new(config),
            store,
            fetcher,
            batcher,
            config_hash,
        })
    }

    /// Runs every phase permitted by the configured depth
    ///
    /// Node fetch failures are isolated unless `fail_fast` is set; they show
    /// up in the returned report. Storage failures and fail-fast fetch
    /// failures abort the run with an error.
    pub async fn run(&mut self) -> Result<CrawlReport, HarvestError> {
        let year = self.config.crawler.year;
        let depth = self.config.crawler.depth;
        let run_id = self
            .lock_store()
            .create_run(year, depth, &self.config_hash)?;

        tracing::info!(
            "Starting crawl run {} for {} down to {} (concurrency {})",
            run_id,
            year,
            depth,
            self.batcher.concurrency()
        );

        let start_time = Instant::now();
        let mut report = CrawlReport::new(run_id, year, depth);
        let result = self.run_phases(&mut report).await;

        let failed = report.failed_nodes();
        let status = match &result {
            Ok(()) if failed == 0 => RunStatus::Completed,
            Ok(()) => RunStatus::Incomplete,
            Err(_) => RunStatus::Failed,
        };

        let finished = self
            .lock_store()
            .finish_run(run_id, status, failed as u32);

        match (result, finished) {
            (Err(e), finish_result) => {
                if let Err(finish_error) = finish_result {
                    tracing::error!("Failed to record run {}: {}", run_id, finish_error);
                }
                tracing::error!("Crawl run {} aborted during {}: {}", run_id, report.phase, e);
                Err(e)
            }
            (Ok(()), Err(finish_error)) => Err(finish_error.into()),
            (Ok(()), Ok(())) => {
                tracing::info!(
                    "Crawl run {} {}: {} row(s) inserted, {} node(s) failed in {:?}",
                    run_id,
                    status.to_db_string(),
                    report.inserted(),
                    failed,
                    start_time.elapsed()
                );
                Ok(report)
            }
        }
    }

    async fn run_phases(&self, report: &mut CrawlReport) -> Result<(), HarvestError> {
        let depth = self.config.crawler.depth;
        let fail_fast = self.config.crawler.fail_fast;

        loop {
            report.phase = report.phase.next(depth);
            let Some(level) = report.phase.target_level() else {
                break;
            };

            tracing::info!("Phase: {}", report.phase);
            let (level_report, first_failure) = match level {
                Level::Province => self.seed_provinces().await?,
                _ => self.expand_level(level).await?,
            };

            tracing::info!(
                "{}: {}/{} page(s) expanded, {} failed, {} found, {} inserted",
                level,
                level_report.expanded,
                level_report.frontier,
                level_report.failed.len(),
                level_report.found,
                level_report.inserted
            );
            report.levels.push(level_report);

            if let Some(error) = first_failure.filter(|_| fail_fast) {
                return Err(error.into());
            }
        }

        Ok(())
    }

    /// Fetches the province index and inserts the provinces it lists
    async fn seed_provinces(&self) -> Result<(LevelReport, Option<FetchError>), HarvestError> {
        let year = self.config.crawler.year;
        let index_url = self.config.source.index_url_for(year);
        let mut report = LevelReport::new(Level::Province, 1);

        match self.fetcher.fetch(&index_url, LevelExtractor::Province).await {
            Ok(records) => {
                let summary = {
                    let mut store = self.lock_store();
                    persist_children(&mut *store, year, Level::Province, None, &records)?
                };
                report.record_expanded(&summary);
                Ok((report, None))
            }
            Err(error) => {
                tracing::warn!("Province index {} failed: {}", index_url, error);
                report.failed.push(NodeFailure {
                    code: "index".to_string(),
                    url: error.url().to_string(),
                    error: error.to_string(),
                });
                Ok((report, Some(error)))
            }
        }
    }

    /// Expands every unexpanded parent of `level` rows, one batch at a time
    async fn expand_level(
        &self,
        level: Level,
    ) -> Result<(LevelReport, Option<FetchError>), HarvestError> {
        let year = self.config.crawler.year;
        let fail_fast = self.config.crawler.fail_fast;

        let Some(parent) = level.parent() else {
            return Ok((LevelReport::new(level, 0), None));
        };

        let frontier = {
            let store = self.lock_store();
            select_frontier(&*store, year, parent)?
        };
        let mut report = LevelReport::new(level, frontier.len());

        if frontier.is_empty() {
            tracing::info!("No unexpanded {} node(s) for {}", parent, year);
            return Ok((report, None));
        }

        let extractor = LevelExtractor::for_level(level);

        let batch = self
            .batcher
            .run(
                frontier,
                |node| self.expand_node(node, extractor),
                |outcome: &Result<NodeOutcome, StorageError>| match outcome {
                    Err(_) => true,
                    Ok(NodeOutcome::Failed { .. }) => fail_fast,
                    Ok(NodeOutcome::Expanded { .. }) => false,
                },
            )
            .await;

        report.skipped = report.frontier - batch.outcomes.len();
        if batch.halted && report.skipped > 0 {
            tracing::warn!("{} {} node(s) left for a later run", report.skipped, parent);
        }

        let mut first_failure = None;
        for outcome in batch.outcomes {
            match outcome? {
                NodeOutcome::Expanded { code, summary } => {
                    tracing::trace!("{} {} {}", parent, code, Expansion::Expanded(summary.found));
                    report.record_expanded(&summary);
                }
                NodeOutcome::Failed { code, error } => {
                    tracing::warn!("{} {} left unexpanded: {}", parent, code, error);
                    report.failed.push(NodeFailure {
                        code,
                        url: error.url().to_string(),
                        error: error.to_string(),
                    });
                    first_failure.get_or_insert(error);
                }
            }
        }

        Ok((report, first_failure))
    }

    /// Fetches one parent's listing page and persists its children
    async fn expand_node(
        &self,
        node: RegionNode,
        extractor: LevelExtractor,
    ) -> Result<NodeOutcome, StorageError> {
        let year = self.config.crawler.year;

        let Some(url) = node.url.as_deref() else {
            return Ok(NodeOutcome::Failed {
                error: FetchError::InvalidUrl {
                    url: String::new(),
                    message: format!("{} {} has no listing page", node.level, node.code),
                },
                code: node.code,
            });
        };

        match self.fetcher.fetch(url, extractor).await {
            Ok(records) => {
                let summary = {
                    let mut store = self.lock_store();
                    persist_children(&mut *store, year, extractor.level(), Some(&node), &records)?
                };
                Ok(NodeOutcome::Expanded {
                    code: node.code,
                    summary,
                })
            }
            Err(error) => Ok(NodeOutcome::Failed {
                code: node.code,
                error,
            }),
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

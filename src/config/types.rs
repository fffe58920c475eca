use crate::region::Level;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub source: SourceConfig,
    pub output: OutputConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Deepest level to create this run
    pub depth: Level,

    /// Year partition of the directory
    pub year: u16,

    /// Number of nodes fetched together in one batch
    pub concurrency: u32,

    /// Pause between batches (milliseconds)
    pub interval_ms: u64,

    /// Per-navigation timeout (milliseconds)
    pub timeout_ms: u64,

    /// Fetch attempts per node before giving up
    pub max_attempts: u32,

    /// Pause between attempts on the same node (milliseconds)
    pub retry_delay_ms: u64,

    /// Whether the page client should run without a visible window
    pub headless: bool,

    /// Stop the run after the first batch containing a failed node
    pub fail_fast: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            depth: Level::District,
            year: 2018,
            concurrency: 3,
            interval_ms: 500,
            timeout_ms: 3000,
            max_attempts: 3,
            retry_delay_ms: 1000,
            headless: false,
            fail_fast: false,
        }
    }
}

impl CrawlerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Remote directory configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Top-level index page; `{year}` is replaced with the crawl year
    pub index_url: String,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Charset used when a response does not declare one
    pub encoding: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            index_url: "http://www.stats.gov.cn/tjsj/tjbz/tjyqhdmhcxhfdm/{year}/index.html"
                .to_string(),
            user_agent: format!("division-harvester/{}", env!("CARGO_PKG_VERSION")),
            encoding: "gbk".to_string(),
        }
    }
}

impl SourceConfig {
    /// Index page URL for a given year
    pub fn index_url_for(&self, year: u16) -> String {
        self.index_url.replace("{year}", &year.to_string())
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "data/database.sqlite".to_string(),
        }
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub depth: Option<Level>,
    pub year: Option<u16>,
    pub concurrency: Option<u32>,
    pub interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub headless: Option<bool>,
    pub database_path: Option<String>,
    pub fail_fast: bool,
}

impl Config {
    /// Applies command-line overrides on top of this configuration
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(depth) = overrides.depth {
            self.crawler.depth = depth;
        }
        if let Some(year) = overrides.year {
            self.crawler.year = year;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.crawler.concurrency = concurrency;
        }
        if let Some(interval) = overrides.interval_ms {
            self.crawler.interval_ms = interval;
        }
        if let Some(timeout) = overrides.timeout_ms {
            self.crawler.timeout_ms = timeout;
        }
        if let Some(headless) = overrides.headless {
            self.crawler.headless = headless;
        }
        if let Some(path) = &overrides.database_path {
            self.output.database_path = path.clone();
        }
        if overrides.fail_fast {
            self.crawler.fail_fast = true;
        }
    }
}

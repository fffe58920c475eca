//! Division Harvester: a resumable crawler for administrative divisions
//!
//! This crate walks the four-level province → city → district → town
//! hierarchy published by a paginated public directory, one HTML table per
//! parent node, and persists it into SQLite so that an interrupted crawl can
//! be re-run without re-fetching or re-inserting completed subtrees.

pub mod config;
pub mod crawler;
pub mod output;
pub mod region;
pub mod storage;

use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run finished with {failed} node(s) left unexpanded; re-run to resume")]
    Incomplete { failed: usize },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render TOML: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport};
pub use region::{ChildRecord, Expansion, Level, RegionNode};
pub use storage::{RegionStore, SqliteRegionStore};

//! Storage module for persisting the harvested hierarchy
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Idempotent region inserts keyed by (year, code)
//! - Completion markers that drive the resumable frontier
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteRegionStore;
pub use traits::{RegionStore, StorageError, StorageResult};

use crate::region::Level;
use crate::HarvestError;

use std::path::Path;

/// Opens (creating if needed) the region database at `path`
pub fn open_storage(path: &Path) -> Result<SqliteRegionStore, HarvestError> {
    SqliteRegionStore::new(path)
}

/// Represents a harvester run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub year: u16,
    pub depth: Level,
    pub config_hash: String,
    pub status: RunStatus,
    pub failed_nodes: u32,
}

/// Status of a harvester run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// Every permitted level drained its frontier
    Completed,
    /// Finished, but some nodes exhausted their fetch attempts
    Incomplete,
    /// Aborted on an unrecovered error
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "incomplete" => Some(Self::Incomplete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Row counts for one level of one year
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelStats {
    /// Rows stored at this level
    pub total: u64,

    /// Rows whose children are fully known
    pub expanded: u64,

    /// Expandable rows still waiting for their first expansion
    pub pending: u64,

    /// Rows without a listing page
    pub leaves: u64,

    /// Sum of the completion counts
    pub children_found: u64,
}

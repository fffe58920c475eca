//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::region::{Level, NewRegion, RegionNode};
use crate::storage::{LevelStats, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// A row already exists at this key. Callers treat this as "already done".
    #[error("{level} {year}/{code} already exists")]
    Conflict {
        level: Level,
        year: u16,
        code: String,
    },

    #[error("{level} row {code} needs a parent reference")]
    MissingParent { level: Level, code: String },

    #[error("{0} rows have no completion marker")]
    NoCompletion(Level),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Returns true for duplicate-key conflicts
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for region storage backends
///
/// Rows are addressed by `(level, year, code)`. The trait is synchronous;
/// the crawler serializes access behind a mutex and never holds it across
/// a network wait.
pub trait RegionStore {
    // ===== Region Queries =====

    /// Returns the rows of `level` whose completion marker is unset and that
    /// have a non-empty listing URL, ordered by code
    ///
    /// Levels without a completion marker yield an empty list.
    fn find_missing_completion(&self, year: u16, level: Level) -> StorageResult<Vec<RegionNode>>;

    /// Checks whether a row exists at `(year, code)` on `level`
    fn exists(&self, level: Level, year: u16, code: &str) -> StorageResult<bool>;

    /// Gets a single row
    fn get_region(&self, level: Level, year: u16, code: &str) -> StorageResult<Option<RegionNode>>;

    /// Lists all rows of a level for a year, ordered by code
    fn list_regions(&self, level: Level, year: u16) -> StorageResult<Vec<RegionNode>>;

    // ===== Region Writes =====

    /// Inserts a row
    ///
    /// Returns `StorageError::Conflict` if the key is taken.
    fn insert(&mut self, level: Level, region: &NewRegion<'_>) -> StorageResult<()>;

    /// Records that a row's children are fully known
    ///
    /// The marker is written only while it is still unset. Returns `false`
    /// when nothing changed (row missing or already expanded).
    fn update_completion(
        &mut self,
        level: Level,
        year: u16,
        code: &str,
        count: u32,
    ) -> StorageResult<bool>;

    // ===== Run Management =====

    /// Creates a new run and returns its ID
    fn create_run(&mut self, year: u16, depth: Level, config_hash: &str) -> StorageResult<i64>;

    /// Closes a run with a final status and failed-node count
    fn finish_run(&mut self, run_id: i64, status: RunStatus, failed_nodes: u32)
        -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Statistics =====

    /// Counts rows, expansions and leaves for one level
    fn level_stats(&self, level: Level, year: u16) -> StorageResult<LevelStats>;
}

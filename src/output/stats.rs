//! Statistics generation from the region database
//!
//! This module provides functionality for extracting and displaying
//! per-level harvest statistics from the storage layer.

use crate::region::Level;
use crate::storage::{LevelStats, RegionStore, RunRecord, StorageResult};

/// Harvest statistics for one year
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    pub year: u16,

    /// Row counts, province first
    pub levels: Vec<(Level, LevelStats)>,

    /// Most recent run recorded in the database, for any year
    pub latest_run: Option<RunRecord>,
}

impl HarvestStatistics {
    /// Total rows across all levels
    pub fn total_rows(&self) -> u64 {
        self.levels.iter().map(|(_, stats)| stats.total).sum()
    }

    /// Expandable rows not yet expanded, across all levels
    pub fn pending(&self) -> u64 {
        self.levels.iter().map(|(_, stats)| stats.pending).sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The storage backend to query
/// * `year` - Year partition to summarize
pub fn load_statistics<S: RegionStore + ?Sized>(
    store: &S,
    year: u16,
) -> StorageResult<HarvestStatistics> {
    let mut levels = Vec::with_capacity(Level::ALL.len());
    for level in Level::ALL {
        levels.push((level, store.level_stats(level, year)?));
    }

    Ok(HarvestStatistics {
        year,
        levels,
        latest_run: store.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ({}) ===\n", stats.year);

    println!(
        "  {:<10} {:>8} {:>9} {:>8} {:>7} {:>9}",
        "Level", "Rows", "Expanded", "Pending", "Leaves", "Children"
    );
    for (level, row) in &stats.levels {
        if level.completion_column().is_some() {
            println!(
                "  {:<10} {:>8} {:>9} {:>8} {:>7} {:>9}",
                level.to_string(),
                row.total,
                row.expanded,
                row.pending,
                row.leaves,
                row.children_found
            );
        } else {
            println!(
                "  {:<10} {:>8} {:>9} {:>8} {:>7} {:>9}",
                level.to_string(),
                row.total,
                "-",
                "-",
                row.leaves,
                "-"
            );
        }
    }
    println!();

    println!("Total rows: {}", stats.total_rows());
    println!("Pending expansions: {}", stats.pending());
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  Id: {}", run.id);
            println!("  Year: {}", run.year);
            println!("  Depth: {}", run.depth);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            println!(
                "  Finished: {}",
                run.finished_at.as_deref().unwrap_or("(not finished)")
            );
            println!("  Failed nodes: {}", run.failed_nodes);
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No runs recorded"),
    }
}

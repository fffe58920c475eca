//! Output module for reporting harvest results
//!
//! This module handles:
//! - Loading per-level row statistics from the store
//! - Printing them together with the latest run

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};

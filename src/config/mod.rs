//! Configuration module for the harvester
//!
//! Run parameters come from built-in defaults, an optional TOML file, and
//! command-line overrides, in that order. The resolved `Config` is passed
//! explicitly to the crawler.
//!
//! # Example
//!
//! ```no_run
//! use division_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Crawling down to: {}", config.crawler.depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig, Overrides, SourceConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, parse_config, resolve_config};

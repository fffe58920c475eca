//! Division Harvester main entry point
//!
//! This is the command-line interface for the administrative division crawler.

use anyhow::Context;
use clap::Parser;
use division_harvester::config::{resolve_config, Config, Overrides};
use division_harvester::crawler::crawl;
use division_harvester::output::{load_statistics, print_statistics};
use division_harvester::storage::open_storage;
use division_harvester::Level;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Division Harvester: a resumable administrative division crawler
///
/// Walks the province, city, district and town listing pages for one year
/// and stores every row in SQLite. Interrupted or partially failed runs are
/// resumed by running the same command again.
#[derive(Parser, Debug)]
#[command(name = "division-harvester")]
#[command(version)]
#[command(about = "A resumable administrative division crawler", long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Load pages without a visible session (y/n)
    #[arg(long, value_name = "y|n", value_parser = parse_yes_no)]
    headless: Option<bool>,

    /// Deepest level to expand (province, city, district, town)
    #[arg(long)]
    depth: Option<Level>,

    /// Year partition to crawl
    #[arg(long)]
    year: Option<u16>,

    /// Pages fetched concurrently per batch
    #[arg(long)]
    concurrency: Option<u32>,

    /// Pause between batches, in milliseconds
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    /// Per-navigation timeout, in milliseconds
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,

    /// SQLite database path
    #[arg(long, value_name = "PATH")]
    database: Option<String>,

    /// Abort the run at the first node that cannot be fetched
    #[arg(long)]
    fail_fast: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print the effective configuration and exit
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            depth: self.depth,
            year: self.year,
            concurrency: self.concurrency,
            interval_ms: self.interval,
            timeout_ms: self.timeout,
            headless: self.headless,
            database_path: self.database.clone(),
            fail_fast: self.fail_fast,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = resolve_config(cli.config.as_deref(), &cli.overrides())
        .context("Failed to load configuration")?;
    match &cli.config {
        Some(path) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            path.display(),
            config_hash
        ),
        None => tracing::info!("Using default configuration (hash: {})", config_hash),
    }

    if cli.dry_run {
        handle_dry_run(&config, &config_hash)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` takes precedence when set.
fn setup_logging(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "division_harvester=info,warn",
            1 => "division_harvester=debug,info",
            2 => "division_harvester=trace,debug",
            _ => "trace",
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn parse_yes_no(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        other => Err(format!("expected 'y' or 'n', got '{}'", other)),
    }
}

/// Handles the --dry-run mode: shows the configuration a crawl would use
fn handle_dry_run(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    println!("=== Division Harvester Dry Run ===\n");
    println!("{}", toml::to_string_pretty(config)?);
    println!("Config hash: {}", config_hash);
    println!(
        "Would crawl {} down to {} starting at {}",
        config.crawler.year,
        config.crawler.depth,
        config.source.index_url_for(config.crawler.year)
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store, config.crawler.year)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Crawling {} down to {} into {}",
        config.crawler.year,
        config.crawler.depth,
        config.output.database_path
    );

    let report = match crawl(config).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    for level in &report.levels {
        for failure in &level.failed {
            tracing::warn!("Unexpanded {} parent {}: {}", level.level, failure.code, failure.error);
        }
    }

    report.ensure_complete()?;
    tracing::info!("Crawl completed successfully");
    Ok(())
}

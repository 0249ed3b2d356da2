//! CLI command implementations

pub mod browse;
pub mod error;
pub mod fetch;
pub mod worker;

pub use browse::BrowseCommand;
pub use error::CliError;
pub use fetch::FetchArgs;
pub use worker::WorkerArgs;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    Settings, DEFAULT_BASE_URL, DEFAULT_FETCH_INTERVAL_HOURS, DEFAULT_MAX_CONCURRENT_FETCHES,
    DEFAULT_MAX_RETRIES, DEFAULT_MIN_FETCH_DELAY_MS, DEFAULT_STATE_DIR, DEFAULT_TIMEOUT_SECS,
};

/// Upper bound on concurrency slots to stay polite to the remote API
const MAX_CONCURRENCY: usize = 16;

/// Parse and validate a concurrency slot count
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// StatFin ingestion CLI
#[derive(Parser, Debug)]
#[command(name = "statfin-ingest")]
#[command(about = "Ingest PxWeb / StatFin statistical tables into linkable records", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// PxWeb API base URL
    #[arg(long, global = true, env = "STATFIN_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Per-attempt request timeout in seconds
    #[arg(long, global = true, env = "STATFIN_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS,
          value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout_secs: u64,

    /// Retries after the first attempt (range: 0-20)
    #[arg(long, global = true, env = "STATFIN_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES,
          value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,

    /// Concurrent fetch slots (max: 16)
    #[arg(long, global = true, env = "STATFIN_MAX_CONCURRENT", default_value_t = DEFAULT_MAX_CONCURRENT_FETCHES,
          value_parser = parse_concurrency)]
    pub max_concurrent: usize,

    /// Minimum pause between sequential fetches, in milliseconds
    #[arg(long, global = true, env = "STATFIN_MIN_FETCH_DELAY_MS", default_value_t = DEFAULT_MIN_FETCH_DELAY_MS)]
    pub min_fetch_delay_ms: u64,

    /// Scheduler interval in hours
    #[arg(long, global = true, env = "STATFIN_FETCH_INTERVAL_HOURS", default_value_t = DEFAULT_FETCH_INTERVAL_HOURS,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub fetch_interval_hours: u32,

    /// Directory of the file-backed store
    #[arg(long, global = true, env = "STATFIN_STATE_DIR", default_value = DEFAULT_STATE_DIR)]
    pub state_dir: PathBuf,

    /// Serve Prometheus metrics on this address (e.g. 0.0.0.0:9090)
    #[arg(long, global = true, env = "STATFIN_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Runtime settings from the parsed flags.
    pub fn settings(&self) -> Settings {
        Settings {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            max_concurrent_fetches: self.max_concurrent,
            min_fetch_delay: Duration::from_millis(self.min_fetch_delay_ms),
            fetch_interval_hours: self.fetch_interval_hours,
            state_dir: self.state_dir.clone(),
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Browse the table catalog
    Browse(BrowseCommand),
    /// Fetch one source, or every due source, now
    Fetch(FetchArgs),
    /// Run the periodic fetch scheduler until Ctrl+C
    Worker(WorkerArgs),
}

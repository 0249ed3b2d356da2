//! Pipeline configuration constants and runtime settings

use std::path::PathBuf;
use std::time::Duration;

/// Default PxWeb endpoint for the Statistics Finland StatFin database.
pub const DEFAULT_BASE_URL: &str = "https://pxdata.stat.fi/PxWeb/api/v1/fi/StatFin";

/// Per-attempt HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connect timeout in seconds, applied inside the per-attempt timeout.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Retries after the first attempt (3 retries = 4 attempts).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Backoff multiplier applied per attempt.
pub const BACKOFF_FACTOR: u64 = 2;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000; // 30 seconds

/// Concurrent outbound fetch slots.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 3;

/// Minimum pause between sequential fetches of a due batch.
pub const DEFAULT_MIN_FETCH_DELAY_MS: u64 = 1000;

/// Hours until a source becomes due again after a fetch.
pub const DEFAULT_FETCH_INTERVAL_HOURS: u32 = 24;

/// Longest accepted fetch interval (ten years).
pub const MAX_FETCH_INTERVAL_HOURS: u32 = 24 * 366 * 10;

/// Directory holding the file-backed store.
pub const DEFAULT_STATE_DIR: &str = "data";

/// Calculate exponential backoff delay for the given zero-based attempt.
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = BACKOFF_FACTOR
        .checked_pow(retry_count)
        .and_then(|factor| factor.checked_mul(INITIAL_BACKOFF_MS))
        .unwrap_or(MAX_BACKOFF_MS)
        .min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}

/// Runtime settings shared by the client, orchestrator and scheduler.
///
/// The CLI fills these from flags and `STATFIN_*` environment variables;
/// library users usually start from [`Settings::default`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// PxWeb API base URL, without trailing slash
    pub base_url: String,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Concurrency slots for outbound fetches
    pub max_concurrent_fetches: usize,
    /// Minimum delay between sequential fetches in a due batch
    pub min_fetch_delay: Duration,
    /// Scheduler tick interval in hours
    pub fetch_interval_hours: u32,
    /// Root directory of the file-backed store
    pub state_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            min_fetch_delay: Duration::from_millis(DEFAULT_MIN_FETCH_DELAY_MS),
            fetch_interval_hours: DEFAULT_FETCH_INTERVAL_HOURS,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }
}

impl Settings {
    /// Scheduler interval as a [`Duration`].
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.fetch_interval_hours.max(1)) * 3600)
    }
}

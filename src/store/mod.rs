//! Persistence collaborator
//!
//! The orchestrator reads source configuration and reference codes from a
//! [`SourceStore`], hands it normalized record batches and reports fetch
//! status back. [`InMemoryStore`] backs tests and embedding; [`FileStore`]
//! keeps a JSON state document plus one CSV per source on disk.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::catalog::TableQuery;
use crate::config::{DEFAULT_FETCH_INTERVAL_HOURS, MAX_FETCH_INTERVAL_HOURS};
use crate::NormalizedRecord;

/// Store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Unknown source id
    #[error("source not found: {0}")]
    NotFound(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(String),

    /// State or record file could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Advisory file lock could not be taken
    #[error("lock error: {0}")]
    Lock(String),

    /// State file exceeds the size guard
    #[error("state file too large: {size} bytes (max {max})")]
    StateTooLarge {
        /// Actual size
        size: u64,
        /// Allowed size
        max: u64,
    },

    /// Source id would share a record file with an existing source
    #[error("source id '{id}' collides with existing source '{existing}'")]
    IdConflict {
        /// Rejected id
        id: String,
        /// Stored id mapping to the same file
        existing: String,
    },

    /// State file written by an incompatible version
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Supported version
        expected: String,
        /// Version on disk
        found: String,
    },
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of the most recent fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchState {
    /// Never fetched
    #[default]
    Pending,
    /// Last fetch succeeded
    Success,
    /// Last fetch failed
    Failed,
}

/// Fetch bookkeeping for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStatus {
    /// Outcome of the last fetch
    #[serde(default)]
    pub last_fetch_status: FetchState,
    /// Time of the last successful fetch
    #[serde(default)]
    pub last_fetch_at: Option<DateTime<Utc>>,
    /// Error of the last failed fetch
    #[serde(default)]
    pub last_error_message: Option<String>,
    /// When the source becomes due; `None` means due now
    #[serde(default)]
    pub next_fetch_at: Option<DateTime<Utc>>,
    /// Successful fetches so far
    #[serde(default)]
    pub fetch_count: u64,
}

impl FetchStatus {
    /// Apply a status update.
    pub fn apply(&mut self, update: &StatusUpdate) {
        match &update.outcome {
            FetchOutcome::Success => {
                self.last_fetch_status = FetchState::Success;
                self.last_fetch_at = Some(update.at);
                self.last_error_message = None;
                self.fetch_count += 1;
            }
            FetchOutcome::Failure { message } => {
                self.last_fetch_status = FetchState::Failed;
                self.last_error_message = Some(message.clone());
            }
        }
        self.next_fetch_at = Some(update.next_fetch_at);
    }
}

/// Result of a fetch as reported to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Batch written
    Success,
    /// Nothing written
    Failure {
        /// Error description
        message: String,
    },
}

/// Status change after a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Success or failure
    pub outcome: FetchOutcome,
    /// Completion time
    pub at: DateTime<Utc>,
    /// Next scheduled fetch
    pub next_fetch_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_interval_hours() -> u32 {
    DEFAULT_FETCH_INTERVAL_HOURS
}

/// A table to fetch periodically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source id
    pub id: String,
    /// Human-readable name
    #[serde(default)]
    pub name: String,
    /// Table path relative to the API base
    pub table_path: String,
    /// Stored query; `None` selects everything
    #[serde(default)]
    pub query: Option<TableQuery>,
    /// Inactive sources are never fetched by the scheduler
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Hours between fetches
    #[serde(default = "default_interval_hours")]
    pub fetch_interval_hours: u32,
    /// Higher priorities are fetched first
    #[serde(default)]
    pub priority: i32,
    /// Fetch bookkeeping
    #[serde(default)]
    pub status: FetchStatus,
}

impl SourceConfig {
    /// Active source with default interval and priority.
    pub fn new(id: impl Into<String>, table_path: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            table_path: table_path.into(),
            query: None,
            is_active: true,
            fetch_interval_hours: DEFAULT_FETCH_INTERVAL_HOURS,
            priority: 0,
            status: FetchStatus::default(),
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the fetch interval.
    pub fn with_interval_hours(mut self, hours: u32) -> Self {
        self.fetch_interval_hours = hours;
        self
    }

    /// Set the stored query.
    pub fn with_query(mut self, query: TableQuery) -> Self {
        self.query = Some(query);
        self
    }

    /// Set the next scheduled fetch.
    pub fn with_next_fetch_at(mut self, at: DateTime<Utc>) -> Self {
        self.status.next_fetch_at = Some(at);
        self
    }

    /// Mark as inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether the source is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.next_fetch_at.map_or(true, |next| next <= now)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("source id must not be empty".to_string());
        }
        if self.table_path.trim().is_empty() {
            return Err(format!("source '{}' has an empty table path", self.id));
        }
        if self.fetch_interval_hours == 0 {
            return Err(format!("source '{}' must have a fetch interval of at least 1 hour", self.id));
        }
        if self.fetch_interval_hours > MAX_FETCH_INTERVAL_HOURS {
            return Err(format!(
                "source '{}' has a fetch interval of {} hours (max {MAX_FETCH_INTERVAL_HOURS})",
                self.id, self.fetch_interval_hours
            ));
        }
        Ok(())
    }
}

/// Valid region and industry codes at one point in time. `None` means the
/// store has no reference list for that kind and codes are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCodes {
    /// Known region codes
    pub regions: Option<HashSet<String>>,
    /// Known industry codes
    pub industries: Option<HashSet<String>>,
}

impl ReferenceCodes {
    /// Null unknown codes in place and return one warning per nulled code.
    pub fn validate(&self, record: &mut NormalizedRecord) -> Vec<String> {
        let mut warnings = Vec::new();
        if let (Some(valid), Some(code)) = (&self.regions, &record.region_code) {
            if !valid.contains(code) {
                warnings.push(format!("Unknown region code: {code}"));
                record.region_code = None;
            }
        }
        if let (Some(valid), Some(code)) = (&self.industries, &record.industry_code) {
            if !valid.contains(code) {
                warnings.push(format!("Unknown industry code: {code}"));
                record.industry_code = None;
            }
        }
        warnings
    }
}

/// A normalized record as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Source the record came from
    pub source_id: String,
    /// Year
    pub year: i32,
    /// Quarter
    pub quarter: Option<u8>,
    /// Month
    pub month: Option<u8>,
    /// Region code
    pub region_code: Option<String>,
    /// Industry code
    pub industry_code: Option<String>,
    /// Observation
    pub value: Option<f64>,
    /// Measure label
    pub value_label: Option<String>,
    /// Unit label
    pub unit: Option<String>,
    /// Batch timestamp
    pub fetched_at: DateTime<Utc>,
}

/// Identity of a stored record within a source.
type RecordKey = (i32, Option<u8>, Option<u8>, Option<String>, Option<String>, Option<String>);

impl StoredRecord {
    /// Build from a normalized record.
    pub fn from_record(source_id: &str, record: &NormalizedRecord, fetched_at: DateTime<Utc>) -> Self {
        Self {
            source_id: source_id.to_string(),
            year: record.year,
            quarter: record.quarter,
            month: record.month,
            region_code: record.region_code.clone(),
            industry_code: record.industry_code.clone(),
            value: record.value,
            value_label: record.value_label.clone(),
            unit: record.unit.clone(),
            fetched_at,
        }
    }

    fn key(&self) -> RecordKey {
        (
            self.year,
            self.quarter,
            self.month,
            self.region_code.clone(),
            self.industry_code.clone(),
            self.value_label.clone(),
        )
    }
}

/// Counts reported by a batch write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Records with a key not present before
    pub inserted: usize,
    /// Records whose value changed
    pub updated: usize,
    /// Records identical to the previous batch
    pub skipped: usize,
}

/// Compare a replacement batch with the previous one for the same source.
///
/// Keys may repeat (unclassified dimensions, nulled codes), so the n-th
/// record with a key is compared with the n-th previous record with that key.
pub fn summarize_replacement(previous: &[StoredRecord], next: &[StoredRecord]) -> WriteSummary {
    let mut before: HashMap<RecordKey, VecDeque<Option<f64>>> = HashMap::new();
    for record in previous {
        before.entry(record.key()).or_default().push_back(record.value);
    }

    let mut summary = WriteSummary::default();
    for record in next {
        match before.get_mut(&record.key()).and_then(VecDeque::pop_front) {
            None => summary.inserted += 1,
            Some(value) if value == record.value => summary.skipped += 1,
            Some(_) => summary.updated += 1,
        }
    }
    summary
}

/// External persistence used by the orchestrator.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Source by id.
    async fn get_source(&self, id: &str) -> StoreResult<Option<SourceConfig>>;

    /// All active sources, in no particular order.
    async fn list_active_sources(&self) -> StoreResult<Vec<SourceConfig>>;

    /// Snapshot of valid region and industry codes.
    async fn reference_codes(&self) -> StoreResult<ReferenceCodes>;

    /// Replace the records of a source. Either every row is written or none.
    async fn write_batch(&self, source_id: &str, rows: Vec<StoredRecord>) -> StoreResult<WriteSummary>;

    /// Record the outcome of a fetch.
    async fn update_status(&self, source_id: &str, update: StatusUpdate) -> StoreResult<()>;
}

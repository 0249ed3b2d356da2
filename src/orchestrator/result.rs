//! Fetch results and batch summaries

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Outcome of one orchestrated fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResult {
    /// Whether the batch was written
    pub success: bool,
    /// Source id
    pub source_id: String,
    /// Cells in the fetched cube
    pub records_fetched: usize,
    /// New records
    pub records_inserted: usize,
    /// Records whose value changed
    pub records_updated: usize,
    /// Records identical to the previous batch
    pub records_skipped: usize,
    /// Wall time including the wait for a slot
    pub duration_seconds: f64,
    /// Failure description
    pub error_message: Option<String>,
    /// Non-fatal problems, deduplicated
    pub warnings: Vec<String>,
    /// Server-supplied delay when the fetch ended rate limited
    pub retry_after_seconds: Option<f64>,
}

impl FetchResult {
    /// Failed result with nothing fetched.
    pub fn failure(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            source_id: source_id.into(),
            records_fetched: 0,
            records_inserted: 0,
            records_updated: 0,
            records_skipped: 0,
            duration_seconds: 0.0,
            error_message: Some(message.into()),
            warnings: Vec::new(),
            retry_after_seconds: None,
        }
    }
}

impl fmt::Display for FetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(
                f,
                "[OK] {}: {} fetched, {} inserted, {} updated, {} skipped ({:.2}s)",
                self.source_id,
                self.records_fetched,
                self.records_inserted,
                self.records_updated,
                self.records_skipped,
                self.duration_seconds
            )?;
            if !self.warnings.is_empty() {
                write!(f, ", {} warnings", self.warnings.len())?;
            }
            Ok(())
        } else {
            write!(
                f,
                "[FAILED] {}: {} ({:.2}s)",
                self.source_id,
                self.error_message.as_deref().unwrap_or("unknown error"),
                self.duration_seconds
            )
        }
    }
}

/// Per-source error inside a [`BatchSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceError {
    /// Source id
    pub source_id: String,
    /// Error message
    pub error: String,
}

/// Summary of a scheduler run or manual trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub completed_at: DateTime<Utc>,
    /// Sources attempted
    pub attempted: usize,
    /// Successful fetches
    pub successful: usize,
    /// Failed fetches
    pub failed: usize,
    /// Records inserted across all sources
    pub total_records_inserted: usize,
    /// Failures by source
    pub errors: Vec<SourceError>,
    /// Individual results in processing order
    pub results: Vec<FetchResult>,
}

impl BatchSummary {
    /// Summarize a list of results.
    pub fn from_results(
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        results: Vec<FetchResult>,
    ) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        let errors = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| SourceError {
                source_id: r.source_id.clone(),
                error: r.error_message.clone().unwrap_or_default(),
            })
            .collect();

        Self {
            started_at,
            completed_at,
            attempted: results.len(),
            successful,
            failed: results.len() - successful,
            total_records_inserted: results.iter().map(|r| r.records_inserted).sum(),
            errors,
            results,
        }
    }
}

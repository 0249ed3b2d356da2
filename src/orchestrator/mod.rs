//! Fetch orchestrator
//!
//! Runs the pipeline for one source (query, decode, normalize, validate,
//! write, status update) inside one of N concurrency slots, and processes
//! due sources sequentially with a minimum pause between fetches. Every
//! failure ends up in a [`FetchResult`]; nothing escapes as an error.

mod result;
mod scheduler;

pub use result::{BatchSummary, FetchResult, SourceError};
pub use scheduler::Scheduler;

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn, Instrument};

use crate::catalog::{Catalog, TableQuery};
use crate::client::{ClientError, ClientResult, PxWebClient};
use crate::config::{Settings, DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_MIN_FETCH_DELAY_MS};
use crate::cube::{self, CubeError};
use crate::metrics::{record_available_slots, FetchMetrics};
use crate::normalize::{Normalizer, WarningSet};
use crate::shutdown::SharedShutdown;
use crate::store::{
    FetchOutcome, SourceConfig, SourceStore, StatusUpdate, StoreError, StoredRecord, WriteSummary,
};

/// Reasons a fetch fails
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Unknown source id
    #[error("Dataset not found: {0}")]
    SourceNotFound(String),

    /// Source configuration is unusable
    #[error("Invalid source configuration: {0}")]
    InvalidSource(String),

    /// Remote API kept answering 429
    #[error("Rate limited: {0}")]
    RateLimited(ClientError),

    /// Any other transport client failure
    #[error("API error: {0}")]
    Api(ClientError),

    /// Response was not a usable cube
    #[error(transparent)]
    Cube(#[from] CubeError),

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Orchestrator stopped accepting work
    #[error("Orchestrator is shutting down")]
    ShuttingDown,
}

impl From<ClientError> for FetchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::RateLimited { .. } => FetchError::RateLimited(err),
            other => FetchError::Api(other),
        }
    }
}

impl FetchError {
    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited(e) => e.retry_after(),
            _ => None,
        }
    }
}

/// State accumulated while a fetch runs, kept even when it fails.
#[derive(Default)]
struct PipelineProgress {
    records_fetched: usize,
    dropped: usize,
    warnings: WarningSet,
}

/// Drives fetches against a catalog and a store.
pub struct Orchestrator {
    catalog: Arc<Catalog>,
    store: Arc<dyn SourceStore>,
    slots: Semaphore,
    max_concurrent: usize,
    min_fetch_delay: Duration,
    shutdown: Option<SharedShutdown>,
}

impl Orchestrator {
    /// Orchestrator with default slot count and inter-fetch delay.
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn SourceStore>) -> Self {
        Self {
            catalog,
            store,
            slots: Semaphore::new(DEFAULT_MAX_CONCURRENT_FETCHES),
            max_concurrent: DEFAULT_MAX_CONCURRENT_FETCHES,
            min_fetch_delay: Duration::from_millis(DEFAULT_MIN_FETCH_DELAY_MS),
            shutdown: None,
        }
    }

    /// Build the client, catalog and orchestrator from settings.
    pub fn from_settings(settings: &Settings, store: Arc<dyn SourceStore>) -> ClientResult<Self> {
        let catalog = Arc::new(Catalog::new(PxWebClient::from_settings(settings)?));
        Ok(Self::new(catalog, store)
            .with_max_concurrent(settings.max_concurrent_fetches)
            .with_min_fetch_delay(settings.min_fetch_delay))
    }

    /// Set the number of concurrency slots (at least 1).
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        self.slots = Semaphore::new(max_concurrent);
        self.max_concurrent = max_concurrent;
        self
    }

    /// Set the pause between sequential fetches in [`Orchestrator::fetch_due`].
    pub fn with_min_fetch_delay(mut self, delay: Duration) -> Self {
        self.min_fetch_delay = delay;
        self
    }

    /// Attach a shutdown handle; a due batch stops early once it fires.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Configured slot count.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Slots not currently held by a fetch.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Catalog used for queries.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Fetch one source with its stored query (or everything).
    pub async fn fetch_one(&self, source_id: &str) -> FetchResult {
        self.fetch_one_with_query(source_id, None).await
    }

    /// Fetch one source, overriding its query.
    pub async fn fetch_one_with_query(&self, source_id: &str, query: Option<TableQuery>) -> FetchResult {
        let span = info_span!("fetch_one", source_id = %source_id);
        self.run_fetch(source_id, query).instrument(span).await
    }

    async fn run_fetch(&self, source_id: &str, query: Option<TableQuery>) -> FetchResult {
        let started = Instant::now();

        let Ok(permit) = self.slots.acquire().await else {
            return finish(FetchResult::failure(source_id, FetchError::ShuttingDown.to_string()), started);
        };
        record_available_slots(self.slots.available_permits());

        let result = self.fetch_in_slot(source_id, query, started).await;

        drop(permit);
        record_available_slots(self.slots.available_permits());
        result
    }

    async fn fetch_in_slot(&self, source_id: &str, query: Option<TableQuery>, started: Instant) -> FetchResult {
        let fetch_metrics = FetchMetrics::start(source_id);

        let source = match self.store.get_source(source_id).await {
            Ok(Some(source)) => source,
            Ok(None) => {
                let message = FetchError::SourceNotFound(source_id.to_string()).to_string();
                fetch_metrics.record_failure(&message);
                return finish(FetchResult::failure(source_id, message), started);
            }
            Err(e) => {
                let message = FetchError::Store(e).to_string();
                fetch_metrics.record_failure(&message);
                return finish(FetchResult::failure(source_id, message), started);
            }
        };

        if let Err(reason) = source.validate() {
            let message = FetchError::InvalidSource(reason).to_string();
            fetch_metrics.record_failure(&message);
            return finish(FetchResult::failure(source_id, message), started);
        }
        if next_fetch_time(Utc::now(), source.fetch_interval_hours).is_none() {
            let message = FetchError::InvalidSource(format!(
                "fetch interval of {} hours overflows the schedule",
                source.fetch_interval_hours
            ))
            .to_string();
            fetch_metrics.record_failure(&message);
            return finish(FetchResult::failure(source_id, message), started);
        }

        let mut progress = PipelineProgress::default();
        let outcome = self.run_pipeline(&source, query, &mut progress).await;

        let now = Utc::now();
        let next_fetch_at =
            next_fetch_time(now, source.fetch_interval_hours).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut result = FetchResult::failure(source_id, "");
        result.records_fetched = progress.records_fetched;

        let status_outcome = match outcome {
            Ok(summary) => {
                result.success = true;
                result.error_message = None;
                result.records_inserted = summary.inserted;
                result.records_updated = summary.updated;
                result.records_skipped = summary.skipped;
                fetch_metrics.record_success(
                    (summary.inserted + summary.updated + summary.skipped) as u64,
                    progress.dropped as u64,
                );
                FetchOutcome::Success
            }
            Err(e) => {
                let message = e.to_string();
                result.retry_after_seconds = e.retry_after().map(|d| d.as_secs_f64());
                result.error_message = Some(message.clone());
                fetch_metrics.record_failure(&message);
                FetchOutcome::Failure { message }
            }
        };

        let update = StatusUpdate {
            outcome: status_outcome,
            at: now,
            next_fetch_at,
        };
        if let Err(e) = self.store.update_status(&source.id, update).await {
            error!(error = %e, "Failed to update fetch status");
            progress
                .warnings
                .push(format!("Failed to update fetch status: {e}"));
        }

        result.warnings = progress.warnings.into_vec();
        finish(result, started)
    }

    async fn run_pipeline(
        &self,
        source: &SourceConfig,
        query: Option<TableQuery>,
        progress: &mut PipelineProgress,
    ) -> Result<WriteSummary, FetchError> {
        let query = query
            .or_else(|| source.query.clone())
            .unwrap_or_default();
        let raw = self.catalog.query(&source.table_path, &query).await?;

        let dataset = cube::decode(&raw)?;
        progress.records_fetched = dataset.total_cells();

        let normalized = Normalizer::for_dataset(&dataset).normalize(&dataset);
        progress.dropped = normalized.dropped;
        progress.warnings.extend(normalized.warnings);

        // One snapshot for the whole batch.
        let reference = self.store.reference_codes().await?;
        let fetched_at = Utc::now();
        let rows: Vec<StoredRecord> = normalized
            .records
            .into_iter()
            .map(|mut record| {
                progress.warnings.extend(reference.validate(&mut record));
                StoredRecord::from_record(&source.id, &record, fetched_at)
            })
            .collect();

        Ok(self.store.write_batch(&source.id, rows).await?)
    }

    /// Fetch every active source that is due (or all active ones when
    /// `force`), highest priority first, one at a time.
    pub async fn fetch_due(&self, force: bool) -> Vec<FetchResult> {
        let now = Utc::now();
        let mut due = match self.store.list_active_sources().await {
            Ok(sources) => sources,
            Err(e) => {
                error!(error = %e, "Failed to load sources");
                return Vec::new();
            }
        };
        due.retain(|s| force || s.is_due(now));
        sort_by_schedule(&mut due);

        info!(count = due.len(), force, "Fetching due sources");

        let mut results = Vec::with_capacity(due.len());
        for (i, source) in due.iter().enumerate() {
            if self.shutdown_requested() || (i > 0 && !self.pause_between_fetches().await) {
                warn!(
                    remaining = due.len() - i,
                    "Shutdown requested, skipping remaining sources"
                );
                break;
            }
            results.push(self.fetch_one(&source.id).await);
        }
        results
    }

    /// Manual trigger: one source when `source_id` is given, otherwise every
    /// active source regardless of schedule.
    pub async fn trigger(&self, source_id: Option<&str>) -> BatchSummary {
        let started_at = Utc::now();
        let results = match source_id {
            Some(id) => vec![self.fetch_one(id).await],
            None => self.fetch_due(true).await,
        };
        BatchSummary::from_results(started_at, Utc::now(), results)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|s| s.is_shutdown_requested())
    }

    /// Sleep the inter-fetch delay. Returns false if shutdown cut it short.
    async fn pause_between_fetches(&self) -> bool {
        match &self.shutdown {
            Some(shutdown) => tokio::select! {
                _ = tokio::time::sleep(self.min_fetch_delay) => true,
                _ = shutdown.wait_for_shutdown() => false,
            },
            None => {
                tokio::time::sleep(self.min_fetch_delay).await;
                true
            }
        }
    }
}

/// When a source fetched at `from` becomes due again, or `None` past the
/// representable range.
fn next_fetch_time(from: DateTime<Utc>, interval_hours: u32) -> Option<DateTime<Utc>> {
    from.checked_add_signed(chrono::Duration::hours(i64::from(interval_hours)))
}

fn finish(mut result: FetchResult, started: Instant) -> FetchResult {
    result.duration_seconds = started.elapsed().as_secs_f64();
    result
}

/// Priority descending, then next fetch time ascending with unscheduled
/// sources last.
fn sort_by_schedule(sources: &mut [SourceConfig]) {
    sources.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| compare_schedule(a.status.next_fetch_at, b.status.next_fetch_at))
    });
}

fn compare_schedule(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

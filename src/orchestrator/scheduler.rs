//! Periodic fetch scheduler

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::{BatchSummary, Orchestrator};
use crate::shutdown::SharedShutdown;

#[derive(Default)]
struct RunLog {
    runs: AtomicU64,
    last: Mutex<Option<BatchSummary>>,
}

/// Runs [`Orchestrator::fetch_due`] immediately on start and then once per
/// interval until stopped. Runs never overlap; ticks missed while a run is in
/// progress are dropped.
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    shutdown: SharedShutdown,
    handle: Mutex<Option<JoinHandle<()>>>,
    log: Arc<RunLog>,
}

impl Scheduler {
    /// Scheduler stopping when `shutdown` fires.
    pub fn new(orchestrator: Arc<Orchestrator>, interval: Duration, shutdown: SharedShutdown) -> Self {
        Self {
            orchestrator,
            interval: interval.max(Duration::from_secs(1)),
            shutdown,
            handle: Mutex::new(None),
            log: Arc::new(RunLog::default()),
        }
    }

    /// Start the background loop. Returns false if it is already running or
    /// shutdown was requested.
    pub fn start(&self) -> bool {
        let Ok(mut handle) = self.handle.lock() else {
            return false;
        };
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!("Scheduler already running");
            return false;
        }
        if self.shutdown.is_shutdown_requested() {
            warn!("Scheduler cannot start after shutdown was requested");
            return false;
        }

        info!(interval_secs = self.interval.as_secs(), "Starting fetch scheduler");
        *handle = Some(tokio::spawn(run_loop(
            self.orchestrator.clone(),
            self.interval,
            self.shutdown.clone(),
            self.log.clone(),
        )));
        true
    }

    /// Request shutdown and wait for the loop to exit.
    pub async fn stop(&self) {
        self.shutdown.request_shutdown();
        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
        info!("Fetch scheduler stopped");
    }

    /// Whether the loop is running.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .map(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Completed runs.
    pub fn runs_completed(&self) -> u64 {
        self.log.runs.load(Ordering::SeqCst)
    }

    /// Summary of the most recent run.
    pub fn last_summary(&self) -> Option<BatchSummary> {
        self.log.last.lock().ok().and_then(|last| (*last).clone())
    }

    /// Run one due batch in the caller's task.
    pub async fn run_once(&self) -> BatchSummary {
        run_batch(&self.orchestrator, &self.log).await
    }
}

async fn run_loop(
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    shutdown: SharedShutdown,
    log: Arc<RunLog>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => break,
            // First tick completes immediately.
            _ = ticker.tick() => {}
        }
        run_batch(&orchestrator, &log).await;
    }
}

async fn run_batch(orchestrator: &Orchestrator, log: &RunLog) -> BatchSummary {
    let started_at = Utc::now();
    let results = orchestrator.fetch_due(false).await;
    let summary = BatchSummary::from_results(started_at, Utc::now(), results);

    info!(
        attempted = summary.attempted,
        successful = summary.successful,
        failed = summary.failed,
        records_inserted = summary.total_records_inserted,
        "Scheduled fetch run completed"
    );
    for err in &summary.errors {
        warn!(source_id = %err.source_id, error = %err.error, "Scheduled fetch failed");
    }

    log.runs.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut last) = log.last.lock() {
        *last = Some(summary.clone());
    }
    summary
}

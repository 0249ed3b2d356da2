//! Ingestion metrics
//!
//! Request, retry and fetch-outcome counters emitted through the `metrics`
//! facade. A Prometheus scrape endpoint is installed only when
//! [`init_metrics`] is called; until then every emission is a no-op.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Install the Prometheus exporter on `addr`. Idempotent.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        METRICS_INITIALIZED.store(false, Ordering::SeqCst);
        return Err(format!("Failed to install Prometheus exporter: {e}").into());
    }

    describe_counter!(
        "pxweb_http_requests_total",
        Unit::Count,
        "Total number of HTTP requests made to the PxWeb API"
    );
    describe_counter!(
        "pxweb_http_429_errors_total",
        Unit::Count,
        "Total number of 429 rate limit responses received"
    );
    describe_counter!(
        "pxweb_http_retries_total",
        Unit::Count,
        "Total number of retry attempts"
    );
    describe_histogram!(
        "pxweb_http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );
    describe_histogram!(
        "pxweb_retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );
    describe_counter!(
        "fetches_completed_total",
        Unit::Count,
        "Total number of successful source fetches"
    );
    describe_counter!(
        "fetches_failed_total",
        Unit::Count,
        "Total number of failed source fetches"
    );
    describe_counter!(
        "records_dropped_total",
        Unit::Count,
        "Cells dropped during normalization"
    );
    describe_gauge!(
        "fetch_slots_available",
        Unit::Count,
        "Free concurrency slots in the fetch orchestrator"
    );

    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and outcome of one HTTP attempt
pub struct HttpRequestMetrics {
    endpoint: String,
    start_time: Instant,
    correlation_id: String,
    attempt: u32,
}

impl HttpRequestMetrics {
    /// Start recording a new HTTP attempt
    pub fn start(endpoint: impl Into<String>, attempt: u32) -> Self {
        let endpoint = endpoint.into();
        let correlation_id = generate_correlation_id();

        debug!(
            correlation_id = %correlation_id,
            endpoint = %endpoint,
            attempt = attempt,
            "Starting HTTP request"
        );

        Self {
            endpoint,
            start_time: Instant::now(),
            correlation_id,
            attempt,
        }
    }

    /// Record completion with an HTTP status
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "pxweb_http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status_code.to_string(),
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);

        histogram!(
            "pxweb_http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        if status_code == 429 {
            counter!(
                "pxweb_http_429_errors_total",
                "endpoint" => self.endpoint.clone(),
            )
            .increment(1);

            warn!(
                correlation_id = %self.correlation_id,
                endpoint = %self.endpoint,
                attempt = self.attempt,
                "Rate limit response (429) recorded"
            );
        }

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            status = status_code,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    /// Record a network error (no status code)
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "pxweb_http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => "network_error",
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);

        histogram!(
            "pxweb_http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        warn!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            attempt = self.attempt,
            duration_ms = duration.as_millis(),
            "Network error recorded"
        );
    }

    /// Correlation ID for this attempt
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record retry backoff duration
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!(
        "pxweb_http_retries_total",
        "attempt" => attempt.to_string(),
    )
    .increment(1);

    histogram!(
        "pxweb_retry_backoff_duration_seconds",
        "attempt" => attempt.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Update the free fetch-slot gauge
pub fn record_available_slots(available: usize) {
    gauge!("fetch_slots_available").set(available as f64);
}

/// Per-source fetch metrics
pub struct FetchMetrics {
    source_id: String,
    start_time: Instant,
}

impl FetchMetrics {
    /// Start tracking a fetch
    pub fn start(source_id: impl Into<String>) -> Self {
        let source_id = source_id.into();
        info!(source_id = %source_id, "Fetch started");
        Self {
            source_id,
            start_time: Instant::now(),
        }
    }

    /// Record a successful fetch
    pub fn record_success(&self, records_written: u64, records_dropped: u64) {
        counter!(
            "fetches_completed_total",
            "source_id" => self.source_id.clone(),
        )
        .increment(1);

        if records_dropped > 0 {
            counter!(
                "records_dropped_total",
                "source_id" => self.source_id.clone(),
            )
            .increment(records_dropped);
        }

        info!(
            source_id = %self.source_id,
            records_written = records_written,
            records_dropped = records_dropped,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Fetch completed successfully"
        );
    }

    /// Record a failed fetch
    pub fn record_failure(&self, error: &str) {
        counter!(
            "fetches_failed_total",
            "source_id" => self.source_id.clone(),
        )
        .increment(1);

        warn!(
            source_id = %self.source_id,
            error = %error,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Fetch failed"
        );
    }
}

//! Integration tests for the metrics exporter

use std::net::SocketAddr;
use statfin_ingest::metrics;

#[tokio::test]
async fn test_init_metrics_is_idempotent() {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

    assert!(metrics::init_metrics(addr).is_ok());
    // second call is a no-op
    assert!(metrics::init_metrics(addr).is_ok());

    let request = metrics::HttpRequestMetrics::start("https://example.test/vrm", 1);
    request.record_complete(200);
    assert!(request.correlation_id().starts_with("req-"));
}

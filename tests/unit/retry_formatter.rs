//! Unit tests for retry message formatting

use std::time::Duration;
use statfin_ingest::client::retry_formatter::{extract_error_type, RetryContext, RetryErrorType};
use statfin_ingest::client::TransportError;

#[test]
fn test_retry_message_format() {
    let ctx = RetryContext::new(
        2,
        4,
        RetryErrorType::ServerError(503),
        Duration::from_millis(2000),
        "HTTP 503: busy",
        "https://pxdata.stat.fi/PxWeb/api/v1/fi/StatFin/vrm",
    );

    assert_eq!(
        ctx.format_retry(),
        "Retrying (attempt 2/4) after service unavailable - waiting 2.0 seconds... \
         (https://pxdata.stat.fi/PxWeb/api/v1/fi/StatFin/vrm)"
    );
}

#[test]
fn test_failure_message_lists_suggestions() {
    let ctx = RetryContext::new(
        4,
        4,
        RetryErrorType::NetworkTimeout,
        Duration::from_secs(8),
        "request timed out",
        "https://example.test/table.px",
    );

    let message = ctx.format_failure();
    assert!(message.starts_with("[FAILED] Request failed after 4 attempts"));
    assert!(message.contains("Last error: request timed out"));
    assert!(message.contains("--timeout-secs"));
    assert!(message.contains("Try increasing --max-retries (current: 3)"));
}

#[test]
fn test_client_errors_get_no_retry_suggestion() {
    let ctx = RetryContext::new(
        1,
        4,
        RetryErrorType::ClientError(400),
        Duration::ZERO,
        "HTTP 400",
        "https://example.test/table.px",
    );
    let suggestions = ctx.format_suggestions();
    assert_eq!(suggestions.len(), 1);
    assert!(!RetryErrorType::ClientError(400).is_retryable());
    assert_eq!(RetryErrorType::ClientError(404).description(), "table or folder not found");
}

#[test]
fn test_classification() {
    assert_eq!(extract_error_type(Some(429), None), RetryErrorType::RateLimit);
    assert_eq!(extract_error_type(Some(502), None), RetryErrorType::ServerError(502));
    assert_eq!(
        extract_error_type(None, Some(&TransportError::Connect("refused".into()))),
        RetryErrorType::NetworkOffline
    );
    assert_eq!(
        extract_error_type(None, Some(&TransportError::Other("reset".into()))),
        RetryErrorType::NetworkGeneric
    );
    assert_eq!(extract_error_type(None, None), RetryErrorType::NetworkGeneric);
}

//! Integration tests for PxWeb client retry behavior

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use statfin_ingest::client::{ClientError, HttpMethod, RawResponse, TransportError};

use crate::common::{client, ScriptedTransport, BASE_URL};

#[tokio::test]
async fn test_rate_limited_without_retries_reports_retry_after() {
    let transport = Arc::new(ScriptedTransport::always(Ok(
        RawResponse::new(429, "Too Many Requests").with_retry_after("30"),
    )));
    let client = client(transport.clone(), 0);

    let err = client.get("vaerak").await.unwrap_err();

    assert_eq!(
        err,
        ClientError::RateLimited {
            retry_after: Duration::from_secs(30)
        }
    );
    assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_waits_retry_after_then_succeeds() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(RawResponse::new(429, "").with_retry_after("2.5")),
        Ok(RawResponse::new(200, r#"{"ok": true}"#)),
    ]));
    let client = client(transport.clone(), 3);

    let started = tokio::time::Instant::now();
    let body = client.get("vaerak").await.unwrap();

    assert_eq!(body, json!({"ok": true}));
    assert_eq!(transport.calls(), 2);
    assert!(started.elapsed() >= Duration::from_millis(2500));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_without_header_uses_backoff() {
    let transport = Arc::new(ScriptedTransport::always(Ok(RawResponse::new(429, ""))));
    let client = client(transport.clone(), 2);

    let started = tokio::time::Instant::now();
    let err = client.get("vaerak").await.unwrap_err();

    assert_eq!(transport.calls(), 3);
    assert_eq!(
        transport.gaps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert!(started.elapsed() >= Duration::from_secs(3));
    // hint on exhaustion is the backoff the next attempt would have used
    assert_eq!(
        err,
        ClientError::RateLimited {
            retry_after: Duration::from_secs(4)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_server_error_backoff_doubles_up_to_cap() {
    let transport = Arc::new(ScriptedTransport::always(Ok(RawResponse::new(
        503,
        "Service Unavailable",
    ))));
    let client = client(transport.clone(), 7);

    let err = client.get("vaerak").await.unwrap_err();

    assert!(matches!(err, ClientError::RemoteServerError { status: 503, .. }));
    assert_eq!(transport.calls(), 8);
    let waits: Vec<u64> = transport.gaps().iter().map(Duration::as_secs).collect();
    assert_eq!(waits, vec![1, 2, 4, 8, 16, 30, 30]);
}

#[tokio::test(start_paused = true)]
async fn test_server_errors_exhaust_retries() {
    let transport = Arc::new(ScriptedTransport::always(Ok(RawResponse::new(
        500,
        "Internal Server Error",
    ))));
    let client = client(transport.clone(), 1);

    let err = client.get("vaerak").await.unwrap_err();

    assert!(matches!(err, ClientError::RemoteServerError { status: 500, .. }));
    assert_eq!(
        err.to_string(),
        "StatFin API error (500): Internal Server Error"
    );
    // max_retries=1 means initial attempt + 1 retry
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_server_error_then_success() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(RawResponse::new(503, "unavailable")),
        Ok(RawResponse::new(200, "[]")),
    ]));
    let client = client(transport.clone(), 3);

    let started = tokio::time::Instant::now();
    assert_eq!(client.get("").await.unwrap(), json!([]));
    assert_eq!(transport.calls(), 2);
    // first backoff is one second
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let transport = Arc::new(ScriptedTransport::always(Ok(RawResponse::new(
        404,
        "Not Found",
    ))));
    let client = client(transport.clone(), 3);

    let err = client.post("missing.px", &json!({})).await.unwrap_err();

    assert_eq!(
        err,
        ClientError::RemoteClientError {
            status: 404,
            body: "Not Found".to_string()
        }
    );
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_exhaust_retries() {
    let transport = Arc::new(ScriptedTransport::always(Err(TransportError::Timeout(
        "deadline elapsed".to_string(),
    ))));
    let client = client(transport.clone(), 2);

    let err = client.get("vaerak").await.unwrap_err();

    match err {
        ClientError::TransportExhausted { attempts, message } => {
            assert_eq!(attempts, 3);
            assert!(message.contains("deadline elapsed"));
        }
        other => panic!("expected TransportExhausted, got {other:?}"),
    }
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_non_json_body_is_invalid() {
    let transport = Arc::new(ScriptedTransport::always(Ok(RawResponse::new(
        200,
        "<html>maintenance</html>",
    ))));
    let client = client(transport, 0);

    let err = client.get("vaerak").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidBody(_)));
}

#[tokio::test]
async fn test_requests_use_base_url_and_method() {
    let transport = Arc::new(ScriptedTransport::json(json!({})));
    let client = client(transport.clone(), 0);

    client.get("/vaerak/").await.unwrap();
    client
        .post("vaerak/statfin_vaerak_pxt_11ra.px", &json!({"query": []}))
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method, HttpMethod::Get);
    assert_eq!(requests[0].url, format!("{BASE_URL}/vaerak/"));
    assert!(requests[0].body.is_none());
    assert_eq!(requests[1].method, HttpMethod::Post);
    assert_eq!(requests[1].body, Some(json!({"query": []})));
}

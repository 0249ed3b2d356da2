//! PxWeb HTTP client with retry and rate-limit handling

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::retry_formatter::{extract_error_type, RetryContext};
use super::transport::{HttpMethod, ReqwestTransport, Transport, TransportError};
use super::{ClientError, ClientResult};
use crate::config::{calculate_backoff, Settings};
use crate::metrics::{record_retry_backoff, HttpRequestMetrics};

/// Retrying JSON client bound to one PxWeb base URL.
#[derive(Clone)]
pub struct PxWebClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    max_retries: u32,
}

impl std::fmt::Debug for PxWebClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PxWebClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl PxWebClient {
    /// Create a client over an arbitrary transport.
    ///
    /// # Arguments
    /// * `transport` - HTTP exchange implementation
    /// * `base_url` - API root, e.g. "https://pxdata.stat.fi/PxWeb/api/v1/fi/StatFin"
    /// * `max_retries` - retries after the first attempt
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>, max_retries: u32) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            transport,
            base_url,
            max_retries,
        }
    }

    /// Create a `reqwest`-backed client from settings.
    pub fn from_settings(settings: &Settings) -> ClientResult<Self> {
        let transport = ReqwestTransport::new(settings.timeout)
            .map_err(|e| ClientError::InvalidBody(e.to_string()))?;
        Ok(Self::new(
            Arc::new(transport),
            settings.base_url.clone(),
            settings.max_retries,
        ))
    }

    /// API root without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Absolute URL for a catalog path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET a path and return its JSON body.
    pub async fn get(&self, path: &str) -> ClientResult<Value> {
        self.request_with_retry(HttpMethod::Get, path, None).await
    }

    /// POST a JSON body to a path and return the JSON response.
    pub async fn post(&self, path: &str, body: &Value) -> ClientResult<Value> {
        self.request_with_retry(HttpMethod::Post, path, Some(body))
            .await
    }

    async fn request_with_retry(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> ClientResult<Value> {
        let url = self.url_for(path);
        let max_attempts = self.max_retries.saturating_add(1);
        let mut last_error: Option<TransportError> = None;

        for attempt in 0..max_attempts {
            let attempts_left = attempt < self.max_retries;
            let backoff = calculate_backoff(attempt);
            let request_metrics = HttpRequestMetrics::start(url.as_str(), attempt + 1);

            debug!(%method, url = %url, attempt = attempt + 1, max_attempts, "Sending request");

            let response = match self.transport.send(method, &url, body).await {
                Ok(response) => response,
                Err(e) => {
                    request_metrics.record_network_error();
                    let ctx = RetryContext::new(
                        attempt + 1,
                        max_attempts,
                        extract_error_type(None, Some(&e)),
                        backoff,
                        e.to_string(),
                        url.as_str(),
                    );
                    last_error = Some(e);
                    if attempts_left {
                        warn!("{}", ctx.format_retry());
                        record_retry_backoff(backoff, attempt + 1);
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    error!("{}", ctx.format_failure());
                    break;
                }
            };

            request_metrics.record_complete(response.status);
            let status = response.status;

            match status {
                429 => {
                    let retry_after = response
                        .retry_after
                        .as_deref()
                        .and_then(parse_retry_after)
                        .unwrap_or(backoff);
                    let ctx = RetryContext::new(
                        attempt + 1,
                        max_attempts,
                        extract_error_type(Some(status), None),
                        retry_after,
                        format!("HTTP {status}"),
                        url.as_str(),
                    );
                    if attempts_left {
                        warn!("{}", ctx.format_retry());
                        record_retry_backoff(retry_after, attempt + 1);
                        tokio::time::sleep(retry_after).await;
                        continue;
                    }
                    error!("{}", ctx.format_failure());
                    return Err(ClientError::RateLimited { retry_after });
                }
                500..=599 => {
                    let ctx = RetryContext::new(
                        attempt + 1,
                        max_attempts,
                        extract_error_type(Some(status), None),
                        backoff,
                        format!("HTTP {status}: {}", response.body),
                        url.as_str(),
                    );
                    if attempts_left {
                        warn!("{}", ctx.format_retry());
                        record_retry_backoff(backoff, attempt + 1);
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    error!("{}", ctx.format_failure());
                    return Err(ClientError::RemoteServerError {
                        status,
                        body: response.body,
                    });
                }
                400..=499 => {
                    // Malformed query or missing table: retrying cannot help.
                    warn!(%method, url = %url, status, "Client error from PxWeb API");
                    return Err(ClientError::RemoteClientError {
                        status,
                        body: response.body,
                    });
                }
                200..=299 => {
                    return serde_json::from_str(&response.body).map_err(|e| {
                        ClientError::InvalidBody(format!("{url}: {e}"))
                    });
                }
                _ => {
                    warn!(%method, url = %url, status, "Unexpected status from PxWeb API");
                    return Err(ClientError::UnexpectedStatus { status });
                }
            }
        }

        Err(ClientError::TransportExhausted {
            attempts: max_attempts,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }
}

/// Parse a `Retry-After` value given in (possibly fractional) seconds.
///
/// HTTP-date values are not used by PxWeb and yield `None`.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

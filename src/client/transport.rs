//! HTTP transport seam
//!
//! The retry loop in [`super::PxWebClient`] talks to a [`Transport`] instead of
//! `reqwest` directly. A transport performs exactly one HTTP exchange and
//! reports either the raw response or a network-level failure; status-code
//! interpretation happens above it.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::config::CONNECT_TIMEOUT_SECS;

/// HTTP verbs used against the PxWeb API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Catalog listing and table metadata
    Get,
    /// Table data query
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// One HTTP response with the body already read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw `Retry-After` header value, if present
    pub retry_after: Option<String>,
    /// Response body text
    pub body: String,
}

impl RawResponse {
    /// Response without a `Retry-After` header.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    /// Attach a `Retry-After` header value.
    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }
}

/// Network-level failures: no HTTP status was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Attempt exceeded its timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other I/O or protocol failure
    #[error("network error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Single-shot HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. `body` is serialized as JSON for POST requests.
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, TransportError>;
}

/// `reqwest`-backed transport. The connection pool lives as long as this value.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport whose every attempt is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .default_headers(headers)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, TransportError> {
        let request = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => {
                let request = self
                    .client
                    .post(url)
                    .header(CONTENT_TYPE, "application/json");
                match body {
                    Some(body) => request.json(body),
                    None => request,
                }
            }
        };

        let response = request.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

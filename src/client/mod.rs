//! Transport client for the PxWeb API
//!
//! [`PxWebClient`] issues GET/POST requests through a [`Transport`], retrying
//! timeouts, connection failures, 5xx and 429 responses with exponential
//! backoff. Every outcome is a [`ClientResult`]; nothing is retried above this
//! layer.

pub mod http;
pub mod retry_formatter;
pub mod transport;

use std::time::Duration;

pub use http::PxWebClient;
pub use transport::{HttpMethod, RawResponse, ReqwestTransport, Transport, TransportError};

/// Errors surfaced by the transport client
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// HTTP 429 after all attempts were used
    #[error("rate limited by remote API (retry after {:.1}s)", .retry_after.as_secs_f64())]
    RateLimited {
        /// Server-supplied (or computed) delay before the next request
        retry_after: Duration,
    },

    /// HTTP 5xx after all attempts were used
    #[error("StatFin API error ({status}): {body}")]
    RemoteServerError {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// HTTP 4xx other than 429, never retried
    #[error("StatFin API error ({status}): {body}")]
    RemoteClientError {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Timeouts or connection failures after all attempts were used
    #[error("request failed after {attempts} attempts: {message}")]
    TransportExhausted {
        /// Attempts made
        attempts: u32,
        /// Last transport error
        message: String,
    },

    /// Informational or redirect status where a JSON body was expected
    #[error("unexpected HTTP status {status} from StatFin API")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
    },

    /// Response (or local client setup) could not be handled
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

impl ClientError {
    /// Retry-after hint carried by [`ClientError::RateLimited`].
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ClientError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Result alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

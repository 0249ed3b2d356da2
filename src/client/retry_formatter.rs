//! Retry message formatting for the PxWeb client.
//!
//! Keeps retry and failure log lines consistent across listing, metadata and
//! query requests.

use std::time::Duration;

use super::transport::TransportError;

/// Classification of retry errors for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Attempt hit its timeout
    NetworkTimeout,
    /// Connection refused, DNS failure, or other offline scenarios
    NetworkOffline,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    ServerError(u16),
    /// HTTP 4xx other than 429
    ClientError(u16),
    /// Generic fallback when no better classification fits
    NetworkGeneric,
}

impl RetryErrorType {
    /// Short description used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::ClientError(code) => match code {
                400 => "invalid query",
                403 => "query too large or forbidden",
                404 => "table or folder not found",
                _ => "client error",
            },
            Self::NetworkGeneric => "network error",
        }
    }

    /// Suggested remediation shown after the final failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Check your network connection or raise --timeout-secs",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => "PxWeb allows a limited number of queries per window; fetch fewer tables at once",
            Self::ServerError(_) => "The statistics service may be under maintenance, try again later",
            Self::ClientError(_) => "Check the table path and dimension selections against the table metadata",
            Self::NetworkGeneric => "Check network connectivity and try again",
        }
    }

    /// Whether this kind of failure is retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RetryErrorType::ClientError(_))
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts configured
    pub max_attempts: u32,
    /// Type of error that triggered retry
    pub error_type: RetryErrorType,
    /// Wait before the next attempt
    pub backoff_duration: Duration,
    /// Original error message for details
    pub error_message: String,
    /// URL that failed
    pub endpoint: String,
}

impl RetryContext {
    /// Convenience constructor used by the retry loop.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        error_type: RetryErrorType,
        backoff_duration: Duration,
        error_message: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type,
            backoff_duration,
            error_message: error_message.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Format standardized retry message with attempt counters.
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... ({})",
            self.attempt,
            self.max_attempts,
            self.error_type.description(),
            self.backoff_duration.as_secs_f64(),
            self.endpoint
        )
    }

    /// Format final failure summary with actionable suggestions.
    pub fn format_failure(&self) -> String {
        let mut lines = vec![
            format!("[FAILED] Request failed after {} attempts", self.attempt),
            format!("  Last error: {}", self.error_message),
            format!("  Endpoint: {}", self.endpoint),
            "  Suggestions:".to_string(),
        ];
        for suggestion in self.format_suggestions() {
            lines.push(format!("    - {suggestion}"));
        }
        lines.join("\n")
    }

    /// Suggestions tailored to the current retry context.
    pub fn format_suggestions(&self) -> Vec<String> {
        let mut suggestions = vec![self.error_type.suggestion().to_string()];
        if self.error_type.is_retryable() {
            suggestions.push(format!(
                "Try increasing --max-retries (current: {})",
                self.max_attempts.saturating_sub(1)
            ));
        }
        suggestions
    }
}

/// Classify an HTTP status or transport failure.
pub fn extract_error_type(status: Option<u16>, err: Option<&TransportError>) -> RetryErrorType {
    if let Some(status) = status {
        match status {
            429 => return RetryErrorType::RateLimit,
            500..=599 => return RetryErrorType::ServerError(status),
            400..=499 => return RetryErrorType::ClientError(status),
            _ => {}
        }
    }

    match err {
        Some(TransportError::Timeout(_)) => RetryErrorType::NetworkTimeout,
        Some(TransportError::Connect(_)) => RetryErrorType::NetworkOffline,
        _ => RetryErrorType::NetworkGeneric,
    }
}

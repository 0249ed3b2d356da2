//! CLI error types and conversions

use crate::client::ClientError;
use crate::store::StoreError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Transport client error
    #[error("client error: {0}")]
    ClientError(#[from] ClientError),

    /// Store error
    #[error("store error: {0}")]
    StoreError(#[from] StoreError),

    /// JSON output error
    #[error("output error: {0}")]
    OutputError(#[from] serde_json::Error),

    /// One or more fetches failed
    #[error("{failed} of {attempted} fetches failed")]
    FetchFailed {
        /// Failed fetches
        failed: usize,
        /// Attempted fetches
        attempted: usize,
    },

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

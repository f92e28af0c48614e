//! Error types for storefront requests

use thiserror::Error;

/// Errors raised while talking to the external provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP error status code
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Failed to parse JSON response
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Response parsed but did not have the expected shape
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Result alias for provider operations
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

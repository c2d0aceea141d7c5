//! Unified error types for shipcheck
//!
//! A failed *check* is not an error: verifiers report failures through their
//! report values. `ShipcheckError` covers the cases where a check could not be
//! run at all.

use thiserror::Error;

/// Unified error type for all shipcheck operations
#[derive(Error, Debug)]
pub enum ShipcheckError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // HTTP errors
    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    // Browser errors
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    // Report errors
    #[error("Report error: {0}")]
    Report(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl ShipcheckError {
    /// Whether a retry of the whole operation could plausibly succeed.
    ///
    /// Only the "unreachable" class qualifies; a structurally wrong artifact
    /// stays wrong no matter how often it is fetched.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ShipcheckError::Http { .. }
                | ShipcheckError::HttpStatus { .. }
                | ShipcheckError::Timeout { .. }
        )
    }
}

/// Result type alias using ShipcheckError
pub type Result<T> = std::result::Result<T, ShipcheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let status = ShipcheckError::HttpStatus {
            url: "https://example.com".to_string(),
            status: 503,
        };
        assert!(status.is_transient());
        assert!(!ShipcheckError::Report("bad".to_string()).is_transient());
        assert!(!ShipcheckError::Browser("crashed".to_string()).is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = ShipcheckError::Timeout {
            operation: "navigate to https://example.com".to_string(),
            seconds: 30,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 30s: navigate to https://example.com"
        );
    }
}

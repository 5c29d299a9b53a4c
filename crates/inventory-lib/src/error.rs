//! Error types for the inventory library.
//!
//! Provider calls surface these; the core components never let one escape a
//! VM's row. They are logged and turned into the field's empty/zero sentinel.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;

/// Main error type for provider lookups and output.
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("Authentication failed: {reason}")]
    Auth { reason: String },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl InventoryError {
    pub fn decode(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether a retry of the same idempotent read could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

//! Error types shared across bulkload crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, BulkError>;

/// Main error type for shared bulkload functionality
#[derive(Error, Debug)]
pub enum BulkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid chunk size: {0} (must be greater than zero)")]
    InvalidChunkSize(usize),

    #[error("File changed since it was queued: expected fingerprint {expected}, got {actual}")]
    FingerprintMismatch { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

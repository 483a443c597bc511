//! Error types for the bulkload CLI
//!
//! Messages are user-facing: each says what went wrong and what to do next.
//! Expected upload failures (a chunk the endpoint rejected) are not errors;
//! they are recorded on the queue item and reported in the summary.

use crate::queue::UploadStatus;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Endpoint is not an absolute URL
    #[error("Invalid API endpoint '{0}'. Use an absolute URL such as 'https://host/api/uploads'.")]
    InvalidEndpoint(String),

    #[error("File '{file}' is {size} bytes, over the {limit} byte limit. Split the file or raise max_file_size.")]
    FileTooLarge { file: String, size: u64, limit: u64 },

    #[error("File '{file}' has unsupported type '{extension}'. Allowed types: {allowed}.")]
    UnsupportedFileType {
        file: String,
        extension: String,
        allowed: String,
    },

    #[error("File not found: '{0}'. Verify the path exists and you have read permissions.")]
    FileNotFound(String),

    #[error("No queued upload with id '{0}'. Run 'bulkload queue list' to see queued uploads.")]
    QueueItemNotFound(String),

    #[error("Upload '{id}' is {from} and cannot become {to}.")]
    InvalidTransition {
        id: String,
        from: UploadStatus,
        to: UploadStatus,
    },

    #[error("Upload '{0}' is already in progress. Wait for it to finish or pause it first.")]
    UploadInProgress(String),

    /// Spreadsheet could not be parsed
    #[error("Failed to parse '{file}': {message}")]
    Parse { file: String, message: String },

    #[error("Configuration error: {0}. Check your config file and BULKLOAD_* environment variables.")]
    Config(String),

    #[error("Failed to parse config file: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] bulkload_common::BulkError),
}

impl CliError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }
}

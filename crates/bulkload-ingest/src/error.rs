//! Decode errors for spreadsheet ingestion

use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Everything that can stop a parse.
///
/// Inside the parser worker these never propagate: each is reported once as
/// a terminal `error` event carrying the `Display` text.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode delimited file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to decode workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Unsupported file format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Sheet '{requested}' not found (available: {available})")]
    SheetNotFound { requested: String, available: String },

    #[error("Workbook contains no sheets")]
    NoSheets,

    #[error("No data found")]
    NoData,

    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,

    /// An `error` event received from the worker
    #[error("{0}")]
    Reported(String),

    #[error("Parser worker is no longer running")]
    WorkerClosed,
}

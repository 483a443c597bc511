//! Bulkload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared data model, error handling and logging for the bulkload workspace.
//!
//! # Overview
//!
//! - **Types**: parsed datasets, upload chunks and per-chunk results
//! - **Error Handling**: the [`BulkError`] type and [`Result`] alias
//! - **Fingerprints**: SHA-256 identity of a source file, used to detect
//!   a file that changed between a pause and a resume
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use bulkload_common::fingerprint::fingerprint_file;
//!
//! fn main() -> bulkload_common::Result<()> {
//!     let fingerprint = fingerprint_file("trades.xlsx")?;
//!     println!("{}", fingerprint);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{BulkError, Result};
pub use types::{ChunkData, ChunkResult, ParsedData, Record, UploadStats};

//! Bulkload Ingest Library
//!
//! Turns spreadsheet files into row records without blocking the caller.
//!
//! # Supported Formats
//!
//! - **Delimited text**: `.csv`, `.tsv`
//! - **Workbooks**: `.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`
//!
//! # Example
//!
//! ```no_run
//! use bulkload_ingest::{FileSource, ParseRequest, ParserHandle, WorkerOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut parser = ParserHandle::spawn(WorkerOptions::default());
//!     let parsed = parser
//!         .parse_to_end(ParseRequest::new(FileSource::path("trades.xlsx"), 1000))
//!         .await?;
//!     println!("{} rows, headers {:?}", parsed.total_rows, parsed.headers);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod rows;
pub mod workbook;
pub mod worker;

pub use error::{DecodeError, Result};
pub use workbook::{FileSource, SpreadsheetFormat};
pub use worker::{ParseRequest, ParserEvent, ParserHandle, WorkerOptions};

//! Workbook decoding
//!
//! Reads a source file into memory and decodes one sheet into a grid of
//! JSON cell values. Empty cells are `Value::Null`; turning the grid into
//! header-keyed records is the job of [`crate::rows`].

use crate::error::{DecodeError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sheet name given to delimited files, which have exactly one sheet
pub const DELIMITED_SHEET_NAME: &str = "Sheet1";

/// A file handed to the parser
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Read from disk when the parse starts
    Path(PathBuf),

    /// Already in memory; `name` is only used to detect the format
    Memory { name: String, bytes: Vec<u8> },
}

impl FileSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn memory(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Memory {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// File name used for format detection and log messages
    pub fn name(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Memory { name, .. } => name.clone(),
        }
    }

    fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Path(path) => Ok(std::fs::read(path)?),
            Self::Memory { bytes, .. } => Ok(bytes),
        }
    }
}

/// Spreadsheet container formats recognised by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Csv,
    Tsv,
    /// Any format calamine can open (xlsx, xlsm, xlsb, xls, ods)
    Workbook,
}

impl SpreadsheetFormat {
    /// Detect the format from a file name's extension (case-insensitive)
    pub fn detect(name: &str) -> Result<Self> {
        let extension = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" | "tab" => Ok(Self::Tsv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "xla" | "ods" => Ok(Self::Workbook),
            _ => Err(DecodeError::UnsupportedFormat(extension)),
        }
    }
}

/// One decoded sheet, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Value>>,
}

/// Read `file` and decode the requested sheet, or the first one.
///
/// This is blocking work; the parser worker runs it off the async runtime.
pub fn read_sheet(file: FileSource, sheet_name: Option<&str>) -> Result<Sheet> {
    let name = file.name();
    let format = SpreadsheetFormat::detect(&name)?;
    let bytes = file.into_bytes()?;

    debug!(file = %name, ?format, bytes = bytes.len(), "Decoding spreadsheet");

    match format {
        SpreadsheetFormat::Csv => read_delimited(&bytes, b',', sheet_name),
        SpreadsheetFormat::Tsv => read_delimited(&bytes, b'\t', sheet_name),
        SpreadsheetFormat::Workbook => read_workbook(bytes, sheet_name),
    }
}

fn read_delimited(bytes: &[u8], delimiter: u8, sheet_name: Option<&str>) -> Result<Sheet> {
    if let Some(requested) = sheet_name {
        if requested != DELIMITED_SHEET_NAME {
            return Err(DecodeError::SheetNotFound {
                requested: requested.to_string(),
                available: DELIMITED_SHEET_NAME.to_string(),
            });
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Value::Null
                    } else {
                        Value::String(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(Sheet {
        name: DELIMITED_SHEET_NAME.to_string(),
        rows,
    })
}

fn read_workbook(bytes: Vec<u8>, sheet_name: Option<&str>) -> Result<Sheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let names = workbook.sheet_names();

    let name = match sheet_name {
        Some(requested) => names
            .iter()
            .find(|n| n.as_str() == requested)
            .cloned()
            .ok_or_else(|| DecodeError::SheetNotFound {
                requested: requested.to_string(),
                available: names.join(", "),
            })?,
        None => names.first().cloned().ok_or(DecodeError::NoSheets)?,
    };

    let range = workbook.worksheet_range(&name)?;
    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect();

    Ok(Sheet { name, rows })
}

/// Map a workbook cell onto a JSON value
fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        Data::Bool(b) => Value::Bool(*b),
        // Dates, durations and cell errors keep their display text
        other => Value::String(other.to_string()),
    }
}

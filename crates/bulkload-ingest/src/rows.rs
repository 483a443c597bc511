//! Sheet to record conversion
//!
//! The first non-blank row of a sheet is the header row. Every later non-blank row
//! becomes a [`Record`] holding every header as a key, so missing cells show
//! up as empty strings instead of absent keys.

use crate::error::{DecodeError, Result};
use crate::workbook::Sheet;
use bulkload_common::{ParsedData, Record};
use serde_json::Value;
use std::collections::HashSet;

/// Name given to a header cell that is blank
const EMPTY_HEADER: &str = "__EMPTY";

/// Split `sheet` into headers and records.
///
/// Fails with [`DecodeError::NoData`] when the sheet has no header row or no
/// data rows after blank rows are dropped.
pub fn sheet_to_parsed(sheet: Sheet) -> Result<ParsedData> {
    let mut rows = sheet.rows.into_iter().skip_while(|row| is_blank(row));
    let header_row = rows.next().ok_or(DecodeError::NoData)?;

    let data_rows: Vec<Vec<Value>> = rows.filter(|row| !is_blank(row)).collect();
    if data_rows.is_empty() {
        return Err(DecodeError::NoData);
    }

    let width = data_rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header_row.len()))
        .max()
        .unwrap_or(0);

    let headers = header_names(&header_row, width);
    let records = data_rows
        .into_iter()
        .map(|row| to_record(&headers, row))
        .collect();

    Ok(ParsedData::new(headers, records))
}

/// Build unique header names for `width` columns.
///
/// Blank headers become `__EMPTY`, `__EMPTY_1`, ...; repeated names get a
/// numeric suffix so no column is silently overwritten.
fn header_names(header_row: &[Value], width: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    (0..width)
        .map(|i| {
            let base = header_row
                .get(i)
                .and_then(cell_text)
                .unwrap_or_else(|| EMPTY_HEADER.to_string());

            let mut name = base.clone();
            let mut suffix = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            name
        })
        .collect()
}

fn to_record(headers: &[String], row: Vec<Value>) -> Record {
    let mut cells = row.into_iter();
    headers
        .iter()
        .map(|header| {
            let value = match cells.next() {
                Some(Value::Null) | None => Value::String(String::new()),
                Some(value) => value,
            };
            (header.clone(), value)
        })
        .collect()
}

fn cell_text(cell: &Value) -> Option<String> {
    match cell {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

fn is_blank(row: &[Value]) -> bool {
    row.iter().all(|cell| match cell {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sheet(rows: Vec<Vec<Value>>) -> Sheet {
        Sheet {
            name: "Sheet1".to_string(),
            rows,
        }
    }

    #[test]
    fn test_rows_keyed_by_header_with_empty_defaults() {
        let parsed = sheet_to_parsed(sheet(vec![
            vec![json!("A"), json!("B")],
            vec![json!(1), json!("x")],
            vec![json!(2)],
            vec![Value::Null, json!("y")],
        ]))
        .unwrap();

        assert_eq!(parsed.headers, vec!["A", "B"]);
        assert_eq!(parsed.total_rows, 3);
        assert_eq!(parsed.rows[0]["A"], json!(1));
        assert_eq!(parsed.rows[1]["B"], json!(""));
        assert_eq!(parsed.rows[2]["A"], json!(""));
        let keys: Vec<&String> = parsed.rows[2].keys().collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn test_header_only_sheet_has_no_data() {
        let err = sheet_to_parsed(sheet(vec![vec![json!("A"), json!("B")]])).unwrap_err();
        assert!(matches!(err, DecodeError::NoData));
        assert_eq!(err.to_string(), "No data found");
    }

    #[test]
    fn test_empty_sheet_has_no_data() {
        assert!(matches!(sheet_to_parsed(sheet(vec![])), Err(DecodeError::NoData)));
    }

    #[test]
    fn test_blank_rows_are_dropped() {
        let parsed = sheet_to_parsed(sheet(vec![
            vec![json!("A")],
            vec![Value::Null],
            vec![json!("  ")],
            vec![json!("kept")],
        ]))
        .unwrap();
        assert_eq!(parsed.total_rows, 1);
        assert_eq!(parsed.rows[0]["A"], json!("kept"));
    }

    #[test]
    fn test_leading_blank_rows_before_header() {
        let parsed = sheet_to_parsed(sheet(vec![
            vec![Value::Null, Value::Null],
            vec![json!(""), json!(" ")],
            vec![json!("account"), json!("qty")],
            vec![json!("ACC-1"), json!(5)],
        ]))
        .unwrap();

        assert_eq!(parsed.headers, vec!["account", "qty"]);
        assert_eq!(parsed.total_rows, 1);
        assert_eq!(parsed.rows[0]["qty"], json!(5));
    }

    #[test]
    fn test_blank_and_duplicate_headers() {
        let parsed = sheet_to_parsed(sheet(vec![
            vec![json!("qty"), Value::Null, json!("qty")],
            vec![json!(1), json!(2), json!(3), json!(4)],
        ]))
        .unwrap();

        assert_eq!(parsed.headers, vec!["qty", "__EMPTY", "qty_1", "__EMPTY_1"]);
        assert_eq!(parsed.rows[0]["qty_1"], json!(3));
        assert_eq!(parsed.rows[0]["__EMPTY_1"], json!(4));
    }

    #[test]
    fn test_numeric_headers_become_text() {
        let parsed = sheet_to_parsed(sheet(vec![
            vec![json!(2024), json!(2025)],
            vec![json!("a"), json!("b")],
        ]))
        .unwrap();
        assert_eq!(parsed.headers, vec!["2024", "2025"]);
    }
}

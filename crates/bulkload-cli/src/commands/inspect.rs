//! `bulkload inspect` command implementation
//!
//! Runs the parser worker over a file and reports what an upload would send.

use crate::config::UploadConfig;
use crate::error::{CliError, Result};
use crate::progress::{create_spinner, format_bytes};
use bulkload_common::fingerprint::fingerprint_file;
use bulkload_ingest::{FileSource, ParseRequest, ParserEvent, ParserHandle, WorkerOptions};
use colored::Colorize;
use serde_json::Value;
use std::path::Path;

/// Parse `file` and print its headers, row count and chunk plan
pub async fn run(config: &UploadConfig, file: &Path, sheet: Option<String>, chunk_size: Option<usize>) -> Result<()> {
    let size = config.validate_file(file)?;
    let chunk_size = chunk_size.unwrap_or(config.chunk_size);
    if chunk_size == 0 {
        return Err(CliError::config("chunk size must be greater than zero"));
    }
    let fingerprint = fingerprint_file(file)?;

    let mut request = ParseRequest::new(FileSource::path(file), config.parse_chunk_size);
    if let Some(sheet) = sheet {
        request = request.with_sheet(sheet);
    }

    let spinner = create_spinner(&format!("Parsing {}", file.display()));
    let mut parser = ParserHandle::spawn(WorkerOptions::default());
    let result = parser
        .parse_with(request, |event| {
            if let ParserEvent::Chunk { progress, .. } = event {
                spinner.set_message(format!("Parsing {} ({}%)", file.display(), progress));
            }
        })
        .await;
    spinner.finish_and_clear();
    parser.shutdown().await;

    let parsed = result.map_err(|e| CliError::parse(file.display().to_string(), e.to_string()))?;

    println!("{}", "File:".cyan().bold());
    println!("  Path:        {}", file.display());
    println!("  Size:        {}", format_bytes(size));
    println!("  Fingerprint: {}", &fingerprint[..16.min(fingerprint.len())]);
    println!();

    println!("{}", display_headers(&parsed.headers, parsed.rows.first()));
    println!();

    println!("{}", "Upload plan:".cyan().bold());
    println!("  Rows:       {}", parsed.total_rows);
    println!("  Chunk size: {}", chunk_size);
    println!("  Chunks:     {}", parsed.total_rows.div_ceil(chunk_size));

    Ok(())
}

fn display_headers(headers: &[String], first_row: Option<&bulkload_common::Record>) -> String {
    use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["#", "Header", "First value"]);

    for (i, header) in headers.iter().enumerate() {
        let sample = first_row
            .and_then(|row| row.get(header))
            .map(display_value)
            .unwrap_or_default();
        table.add_row(vec![(i + 1).to_string(), header.clone(), sample]);
    }

    table.to_string()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("ACC-1")), "ACC-1");
        assert_eq!(display_value(&json!(250.5)), "250.5");
        assert_eq!(display_value(&json!(true)), "true");
    }

    #[test]
    fn test_display_headers_lists_every_column() {
        let mut row = bulkload_common::Record::new();
        row.insert("account".to_string(), json!("ACC-1"));
        let rendered = display_headers(&["account".to_string(), "qty".to_string()], Some(&row));
        assert!(rendered.contains("account"));
        assert!(rendered.contains("ACC-1"));
        assert!(rendered.contains("qty"));
    }
}

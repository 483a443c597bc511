//! Progress bar utilities for CLI operations
//!
//! Bars draw to stderr and hide themselves when stderr is not a terminal.

use crate::queue::{FileQueueItem, QueueListener, UploadStatus};
use bulkload_common::ChunkResult;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} chunks ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a chunk progress bar with custom message
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Status word colored for terminal output
pub fn colored_status(status: UploadStatus) -> String {
    let text = status.as_str();
    match status {
        UploadStatus::Success => text.green().to_string(),
        UploadStatus::Failed => text.red().to_string(),
        UploadStatus::Cancelled => text.dimmed().to_string(),
        UploadStatus::Paused => text.yellow().to_string(),
        UploadStatus::Uploading => text.cyan().to_string(),
        UploadStatus::Pending => text.to_string(),
    }
}

/// Draws one bar per queue item as it uploads
#[derive(Default)]
pub struct QueueProgress {
    bar: Option<ProgressBar>,
}

impl QueueProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueListener for QueueProgress {
    fn on_item_started(&mut self, item: &FileQueueItem) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        self.bar = Some(create_spinner(&format!("Reading {}", item.file.name)));
    }

    fn on_item_progress(&mut self, item: &FileQueueItem, result: &ChunkResult) {
        let bar = match self.bar.take() {
            Some(bar) if bar.length().is_some() => bar,
            spinner => {
                if let Some(spinner) = spinner {
                    spinner.finish_and_clear();
                }
                create_progress_bar(item.total_chunks as u64, &item.file.name)
            },
        };

        if !result.success {
            bar.println(format!(
                "  {} chunk {} failed after {} attempts: {}",
                "✗".red(),
                result.chunk_index,
                result.retry_count,
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }
        bar.set_position(item.chunks_resolved as u64);
        bar.set_message(format!(
            "{} {}% ({}/{} records)",
            item.file.name, item.progress, item.uploaded_records, item.total_records
        ));
        self.bar = Some(bar);
    }

    fn on_item_finished(&mut self, item: &FileQueueItem) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }

        let marker = match item.status {
            UploadStatus::Success => "✓".green(),
            UploadStatus::Failed => "✗".red(),
            _ => "•".yellow(),
        };
        eprintln!(
            "{} {} {} ({}/{} records)",
            marker,
            item.file.name,
            colored_status(item.status),
            item.uploaded_records,
            item.total_records
        );
        if let Some(error) = &item.error {
            eprintln!("  {}", error.dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(50 * 1024 * 1024), "50.00 MB");
    }

    #[test]
    fn test_progress_bar_length() {
        let pb = create_progress_bar(12, "trades.csv");
        assert_eq!(pb.length(), Some(12));
        pb.finish_and_clear();
    }

    #[test]
    fn test_colored_status_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(colored_status(UploadStatus::Failed), "failed");
        assert_eq!(colored_status(UploadStatus::Pending), "pending");
    }
}

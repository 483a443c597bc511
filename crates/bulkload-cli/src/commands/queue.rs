//! `bulkload queue` command implementation
//!
//! Lists and manages queued uploads.

use super::open_coordinator;
use crate::config::UploadConfig;
use crate::error::Result;
use crate::progress::format_bytes;
use crate::queue::FileQueueItem;
use colored::Colorize;

/// List queued uploads
pub async fn list(config: &UploadConfig, json: bool) -> Result<()> {
    let coordinator = open_coordinator(config)?;
    let queue = coordinator.queue().clone();
    coordinator.shutdown().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&queue)?);
        return Ok(());
    }

    if queue.items.is_empty() {
        println!("Upload queue is empty.");
        println!("Run 'bulkload upload <FILE>' to queue a file.");
        return Ok(());
    }

    println!("{}", display_table(&queue.items));
    println!();
    println!(
        "{} upload(s), last updated {}",
        queue.items.len(),
        queue.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if queue.is_paused {
        println!("{} Queue is paused. Run 'bulkload resume' to continue.", "⏸".yellow());
    }
    Ok(())
}

/// Cancel a pending or paused upload
pub async fn cancel(config: &UploadConfig, id: &str) -> Result<()> {
    let mut coordinator = open_coordinator(config)?;
    let result = coordinator.cancel(id);
    coordinator.shutdown().await;

    let item = result?;
    println!("{} Cancelled {}", "✓".green(), item.file.name);
    Ok(())
}

/// Remove an upload from the queue
pub async fn remove(config: &UploadConfig, id: &str) -> Result<()> {
    let mut coordinator = open_coordinator(config)?;
    let result = coordinator.remove(id);
    coordinator.shutdown().await;

    let item = result?;
    println!("{} Removed {}", "✓".green(), item.file.name);
    Ok(())
}

/// Remove finished uploads, or everything with `all`
pub async fn clear(config: &UploadConfig, all: bool) -> Result<()> {
    let mut coordinator = open_coordinator(config)?;
    let result = if all {
        let count = coordinator.queue().items.len();
        coordinator.reset().map(|_| count)
    } else {
        coordinator.clear_finished()
    };
    coordinator.shutdown().await;

    println!("{} Removed {} upload(s)", "✓".green(), result?);
    Ok(())
}

fn display_table(items: &[FileQueueItem]) -> String {
    use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["ID", "File", "Size", "Status", "Progress", "Records", "Failed", "Updated"]);

    for item in items {
        table.add_row(vec![
            item.id.chars().take(8).collect::<String>(),
            truncate_string(&item.file.name, 40),
            format_bytes(item.file.size),
            item.status.to_string(),
            format!("{}%", item.progress),
            format!("{}/{}", item.uploaded_records, item.total_records),
            item.failed_chunks.len().to_string(),
            item.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }

    table.to_string()
}

/// Truncate a string to a maximum length with ellipsis
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("trades.csv", 40), "trades.csv");
        assert_eq!(truncate_string("quarterly_positions_2026.xlsx", 12), "quarterly...");
        assert_eq!(truncate_string("ééééé", 4), "é...");
    }
}

//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod config;
pub mod inspect;
pub mod queue;
pub mod retry;
pub mod upload;

use crate::config::UploadConfig;
use crate::error::Result;
use crate::progress::colored_status;
use crate::queue::{FileQueueItem, UploadControl, UploadCoordinator, UploadStatus};
use crate::transport::HttpTransport;
use colored::Colorize;
use tokio::task::JoinHandle;
use tracing::info;

/// Open the queue with an HTTP transport built from `config`
pub(crate) fn open_coordinator(config: &UploadConfig) -> Result<UploadCoordinator<HttpTransport>> {
    let transport = HttpTransport::new(config.request_timeout())?;
    UploadCoordinator::open(config.clone(), transport)
}

/// Turn Ctrl-C into a pause request honoured at the next chunk boundary.
///
/// Abort the returned task once the upload returns.
pub(crate) fn pause_on_ctrl_c(control: UploadControl) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, pausing upload");
            eprintln!(
                "\n{} Pausing after the current chunk. Run 'bulkload resume' to continue.",
                "⏸".yellow()
            );
            control.pause();
        }
    })
}

/// Print the outcome of each processed item and what to do next
pub(crate) fn print_summary(items: &[FileQueueItem]) {
    if items.is_empty() {
        println!("Nothing to upload.");
        return;
    }

    println!();
    println!("{}", "Upload Summary:".cyan().bold());
    for item in items {
        println!(
            "  {:<10} {} ({}/{} records, {}%)",
            colored_status(item.status),
            item.file.name,
            item.uploaded_records,
            item.total_records,
            item.progress
        );
    }

    let short_id = |item: &FileQueueItem| item.id.chars().take(8).collect::<String>();
    for item in items {
        match item.status {
            UploadStatus::Failed if !item.failed_chunks.is_empty() => println!(
                "\n{} {} chunk(s) of {} failed. Run 'bulkload retry {}' to resend them.",
                "!".red().bold(),
                item.failed_chunks.len(),
                item.file.name,
                short_id(item)
            ),
            UploadStatus::Failed => println!(
                "\n{} {}: {}",
                "!".red().bold(),
                item.file.name,
                item.error.as_deref().unwrap_or("upload failed")
            ),
            UploadStatus::Paused => println!(
                "\n{} {} paused. Run 'bulkload resume {}' to continue.",
                "⏸".yellow(),
                item.file.name,
                short_id(item)
            ),
            _ => {},
        }
    }
}

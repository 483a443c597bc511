//! `bulkload upload` and `bulkload resume` command implementations

use super::{open_coordinator, pause_on_ctrl_c, print_summary};
use crate::config::UploadConfig;
use crate::error::Result;
use crate::progress::QueueProgress;
use crate::queue::UploadMode;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Arguments of `bulkload upload`
#[derive(Debug, Clone, Default)]
pub struct UploadArgs {
    pub files: Vec<PathBuf>,
    pub sheet: Option<String>,
    pub parallel: bool,
    pub matched_record: Option<String>,
    pub filters: Vec<(String, String)>,
}

fn mode(parallel: bool) -> UploadMode {
    if parallel {
        UploadMode::Parallel
    } else {
        UploadMode::Sequential
    }
}

/// Queue `args.files` and upload every pending item
pub async fn run(config: &UploadConfig, args: UploadArgs) -> Result<()> {
    config.validate()?;

    // Reject the whole batch before anything is queued
    for file in &args.files {
        config.validate_file(file)?;
    }

    let mut coordinator = open_coordinator(config)?;
    let filters: BTreeMap<String, String> = args.filters.into_iter().collect();

    for file in &args.files {
        let id = coordinator.enqueue(
            file,
            args.sheet.clone(),
            args.matched_record.clone(),
            filters.clone(),
        )?;
        println!(
            "{} Queued {} ({})",
            "+".green(),
            file.display(),
            id.chars().take(8).collect::<String>()
        );
    }

    let interrupt = pause_on_ctrl_c(coordinator.control());
    let mut progress = QueueProgress::new();
    let result = coordinator.process_pending(mode(args.parallel), &mut progress).await;
    interrupt.abort();
    coordinator.shutdown().await;

    print_summary(&result?);
    Ok(())
}

/// Continue one paused upload, or everything pending and paused
pub async fn resume(config: &UploadConfig, id: Option<String>, parallel: bool) -> Result<()> {
    config.validate()?;

    let mut coordinator = open_coordinator(config)?;
    let interrupt = pause_on_ctrl_c(coordinator.control());
    let mut progress = QueueProgress::new();

    let result = match id {
        Some(id) => coordinator
            .resume(&id, mode(parallel), &mut progress)
            .await
            .map(|item| vec![item]),
        None => coordinator.process_pending(mode(parallel), &mut progress).await,
    };
    interrupt.abort();
    coordinator.shutdown().await;

    print_summary(&result?);
    Ok(())
}

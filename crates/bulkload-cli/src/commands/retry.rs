//! `bulkload retry` command implementation

use super::{open_coordinator, pause_on_ctrl_c, print_summary};
use crate::config::UploadConfig;
use crate::error::Result;
use crate::progress::QueueProgress;

/// Resend the failed chunks of one upload
pub async fn run(config: &UploadConfig, id: &str) -> Result<()> {
    config.validate()?;

    let mut coordinator = open_coordinator(config)?;
    let interrupt = pause_on_ctrl_c(coordinator.control());
    let mut progress = QueueProgress::new();

    let result = coordinator.retry_failed(id, &mut progress).await;
    interrupt.abort();
    coordinator.shutdown().await;

    print_summary(&[result?]);
    Ok(())
}

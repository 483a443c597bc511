//! `bulkload config` command implementation

use crate::config::{default_config_path, UploadConfig};
use crate::error::Result;
use colored::Colorize;

/// Show the effective configuration and where it can be changed
pub async fn show(config: &UploadConfig) -> Result<()> {
    println!("{}", "Bulkload Configuration:".cyan().bold());
    println!();
    println!("{}", config.to_toml()?);

    if let Some(path) = default_config_path() {
        let state = if path.exists() { "found" } else { "not present" };
        println!("{:<13} {} ({})", "Config file:", path.display(), state);
    }
    println!();
    println!("{}", "Environment Variables:".cyan());
    for (var, description) in ENV_VARS {
        println!("  {:<34} - {}", var, description);
    }

    Ok(())
}

const ENV_VARS: &[(&str, &str)] = &[
    ("BULKLOAD_API_ENDPOINT", "Chunk upload URL"),
    ("BULKLOAD_CHUNK_SIZE", "Rows per uploaded chunk"),
    ("BULKLOAD_PARSE_CHUNK_SIZE", "Rows per parser event"),
    ("BULKLOAD_MAX_FILE_SIZE", "Largest accepted file in bytes"),
    ("BULKLOAD_ALLOWED_FILE_TYPES", "Comma-separated extensions"),
    ("BULKLOAD_DELAY_BETWEEN_CHUNKS_MS", "Pause between sequential chunks"),
    ("BULKLOAD_MAX_RETRIES", "Attempts per chunk"),
    ("BULKLOAD_RETRY_DELAY_MS", "Base backoff delay"),
    ("BULKLOAD_CONCURRENCY", "Chunks per parallel batch"),
    ("BULKLOAD_REQUEST_TIMEOUT_SECS", "Per-request timeout"),
    ("BULKLOAD_QUEUE_PATH", "Queue file location"),
    ("BULKLOAD_LOG_LEVEL", "trace, debug, info, warn, error"),
];

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_config_show() {
        assert!(show(&UploadConfig::default()).await.is_ok());
    }

    #[test]
    fn test_env_vars_are_prefixed() {
        assert!(ENV_VARS.iter().all(|(var, _)| var.starts_with("BULKLOAD_")));
    }
}

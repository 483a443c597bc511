//! Bulkload CLI Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Uploads large spreadsheets to an HTTP endpoint in bounded chunks.
//!
//! # Overview
//!
//! - **Transport**: POST one chunk, retrying with exponential backoff
//!   ([`transport`])
//! - **Orchestration**: sequential or batched-concurrent chunk upload with
//!   progress hooks and cooperative stop ([`upload`])
//! - **Queue**: persisted per-file jobs, pause/resume/cancel and manual retry
//!   of failed chunks ([`queue`])
//! - **Commands**: `bulkload upload`, `resume`, `retry`, `queue`, `inspect`,
//!   `config` ([`commands`])

pub mod commands;
pub mod config;
pub mod error;
pub mod progress;
pub mod queue;
pub mod transport;
pub mod upload;

// Re-export commonly used types
pub use config::UploadConfig;
pub use error::{CliError, Result};
pub use queue::{UploadCoordinator, UploadMode, UploadStatus};
pub use transport::{ChunkTransport, HttpTransport, RetryPolicy};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bulkload - chunked spreadsheet uploader
#[derive(Parser, Debug)]
#[command(name = "bulkload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to <config dir>/bulkload/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Upload endpoint, overriding config and BULKLOAD_API_ENDPOINT
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Print the command reference as markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Queue spreadsheets and upload everything pending
    Upload {
        /// Files to upload (.csv, .xlsx, .xls by default)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Sheet to read from workbooks (defaults to the first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Send chunks in concurrent batches (cannot be paused mid-file)
        #[arg(short, long)]
        parallel: bool,

        /// Backend record the rows belong to
        #[arg(short, long)]
        matched_record: Option<String>,

        /// Filter context as key=value; may be repeated
        #[arg(short, long = "filter", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
    },

    /// Continue paused and pending uploads
    Resume {
        /// Resume only this upload (id or unique id prefix)
        id: Option<String>,

        /// Send chunks in concurrent batches
        #[arg(short, long)]
        parallel: bool,
    },

    /// Retry the failed chunks of an upload
    Retry {
        /// Upload id or unique id prefix
        id: String,
    },

    /// Inspect and manage the upload queue
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },

    /// Parse a file and show its headers and row counts without uploading
    Inspect {
        /// File to parse
        file: PathBuf,

        /// Sheet to read from workbooks
        #[arg(short, long)]
        sheet: Option<String>,

        /// Rows per upload chunk to plan for (defaults to chunk_size)
        #[arg(short, long)]
        chunk_size: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Queue subcommands
#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    /// List queued uploads
    List {
        /// Print the queue as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cancel a pending or paused upload
    Cancel {
        /// Upload id or unique id prefix
        id: String,
    },

    /// Remove an upload from the queue
    Remove {
        /// Upload id or unique id prefix
        id: String,
    },

    /// Remove finished uploads
    Clear {
        /// Remove every upload and delete the queue file
        #[arg(short, long)]
        all: bool,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
}

/// Parse a `key=value` filter argument
pub fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upload_args() {
        let cli = Cli::try_parse_from([
            "bulkload",
            "upload",
            "a.csv",
            "b.xlsx",
            "--sheet",
            "Trades",
            "-f",
            "desk=rates",
            "--filter",
            "region = EMEA",
            "--endpoint",
            "https://host/api",
        ])
        .unwrap();

        assert_eq!(cli.endpoint.as_deref(), Some("https://host/api"));
        match cli.command {
            Some(Commands::Upload {
                files,
                sheet,
                parallel,
                filters,
                ..
            }) => {
                assert_eq!(files.len(), 2);
                assert_eq!(sheet.as_deref(), Some("Trades"));
                assert!(!parallel);
                assert_eq!(
                    filters,
                    vec![
                        ("desk".to_string(), "rates".to_string()),
                        ("region".to_string(), "EMEA".to_string())
                    ]
                );
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_key_value_rejects_garbage() {
        assert!(parse_key_value("desk").is_err());
        assert!(parse_key_value("=rates").is_err());
        assert_eq!(parse_key_value("a=b=c").unwrap(), ("a".to_string(), "b=c".to_string()));
    }

    #[test]
    fn test_upload_requires_files() {
        assert!(Cli::try_parse_from(["bulkload", "upload"]).is_err());
    }
}

//! Bulkload CLI - Main entry point

use bulkload_cli::commands::upload::UploadArgs;
use bulkload_cli::{Cli, Commands, ConfigCommand, QueueCommand, UploadConfig};
use bulkload_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use clap::Parser;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Handle markdown help generation
    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    // Ensure a command is provided
    let Some(command) = cli.command else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    };

    // Verbose mode logs debug to the console; otherwise only warnings
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("bulkload")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("Warning: ignoring BULKLOAD_LOG_* settings: {}", e);
            log_config
        },
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        },
    };

    // Load configuration: file, then environment, then flags
    let config = match UploadConfig::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(endpoint) = cli.endpoint {
                config.api_endpoint = endpoint;
            }
            config
        },
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            eprintln!("Error: {}", e);
            process::exit(1);
        },
    };

    if let Err(e) = execute_command(command, &config).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(command: Commands, config: &UploadConfig) -> bulkload_cli::Result<()> {
    use bulkload_cli::commands;

    match command {
        Commands::Upload {
            files,
            sheet,
            parallel,
            matched_record,
            filters,
        } => {
            commands::upload::run(
                config,
                UploadArgs {
                    files,
                    sheet,
                    parallel,
                    matched_record,
                    filters,
                },
            )
            .await
        },

        Commands::Resume { id, parallel } => commands::upload::resume(config, id, parallel).await,

        Commands::Retry { id } => commands::retry::run(config, &id).await,

        Commands::Queue { command } => match command {
            QueueCommand::List { json } => commands::queue::list(config, json).await,
            QueueCommand::Cancel { id } => commands::queue::cancel(config, &id).await,
            QueueCommand::Remove { id } => commands::queue::remove(config, &id).await,
            QueueCommand::Clear { all } => commands::queue::clear(config, all).await,
        },

        Commands::Inspect {
            file,
            sheet,
            chunk_size,
        } => commands::inspect::run(config, &file, sheet, chunk_size).await,

        Commands::Config { command } => match command {
            ConfigCommand::Show => commands::config::show(config).await,
        },
    }
}

//! Pitchsim CLI
//!
//! Main entry point for the pitchsim command-line tool.
//! Manages the knowledge tables that ground simulated sales conversations.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::KnowledgeCommand;
use pitchsim_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// Pitchsim - knowledge retrieval for sales pitch simulation
#[derive(Parser, Debug)]
#[command(name = "pitchsim")]
#[command(about = "Knowledge retrieval for sales pitch simulation", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "PITCHSIM_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.pitchsim/config.yaml)
    #[arg(short, long, global = true, env = "PITCHSIM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Knowledge table management (ingest, query, clear, stats)
    Knowledge(KnowledgeCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.workspace, cli.config)
        .context("Failed to load configuration")?
        .with_overrides(cli.log_level, cli.verbose, cli.no_color);

    logging::init_logging(config.log_level.as_deref(), config.no_color)
        .context("Failed to initialize logging")?;

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Database: {:?}", config.db_path());

    config
        .ensure_state_dir()
        .context("Failed to create state directory")?;

    let command_name = match &cli.command {
        Commands::Knowledge(_) => "knowledge",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Knowledge(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::debug!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result.with_context(|| format!("{} command failed", command_name))
}

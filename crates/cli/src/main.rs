//! pollkit
//!
//! Main entry point for the pollkit answering service.
//! Answers poll-worker and election-official questions from ingested
//! reference material, over HTTP or one-shot from the command line.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ServeCommand};
use pollkit_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// pollkit - question answering for poll workers and election officials
#[derive(Parser, Debug)]
#[command(name = "pollkit")]
#[command(about = "Question answering for poll workers and election officials", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "POLLKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP answering service
    Serve(ServeCommand),

    /// Ask a single question from the command line
    Ask(AskCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from file and environment
    let config = AppConfig::load_from(cli.config.clone())?;

    // Apply CLI overrides
    let bind_override = match &cli.command {
        Commands::Serve(cmd) => cmd.bind.clone(),
        Commands::Ask(_) => None,
    };
    let config = config.with_overrides(bind_override, cli.log_level, cli.verbose, cli.no_color);

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    // Log startup
    tracing::info!("pollkit starting");
    tracing::debug!("Sidecar: {}", config.retrieval.sidecar_endpoint);
    tracing::debug!("Local model: {}", config.generation.local_model);

    let command_name = match &cli.command {
        Commands::Serve(_) => "serve",
        Commands::Ask(_) => "ask",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
    };

    // Log completion
    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

//! Pilot - versioned project state for AI-driven app generation.
//!
//! This is the main entry point for the pilot CLI.

mod commands;
mod runner;

use clap::{Parser, Subcommand};
use commands::*;
use runner::RunnerConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pilot")]
#[command(author, version, about = "Keeps a generated project and its workspace in sync", long_about = None)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Project id (defaults to the configured one, then the folder name)
    #[arg(long, global = true)]
    project: Option<String>,

    /// Enable verbose logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// API key used for every configured LLM provider
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check LLM access, then reconcile offline workspace changes (default)
    Run {
        /// Import offline changes without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// Only check that every configured LLM provider answers
    #[command(name = "check-llm")]
    CheckLlm,
    /// Show workspace changes not yet recorded in the project state
    Status,
    /// List the recorded project states
    History,
    /// Record the workspace as a new project state
    Import,
    /// Overwrite the workspace from the current project state
    Restore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let root = match cli.root_folder {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    let log_file = init_logging(cli.verbose, configured_level(&root).await);
    tracing::debug!(root = %root.display(), "Starting pilot");

    let config = RunnerConfig {
        root,
        project: cli.project,
        api_key: cli.api_key,
    };

    let result = match cli.command.unwrap_or(Commands::Run { yes: false }) {
        Commands::Run { yes } => run_project(config, yes).await,
        Commands::CheckLlm => check_llm(config).await,
        Commands::Status => handle_status(config).await,
        Commands::History => handle_history(config).await,
        Commands::Import => handle_import(config).await,
        Commands::Restore => handle_restore(config).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
        if let Some(path) = log_file {
            eprintln!("Logs: {}", path.display());
        }
    }

    result
}

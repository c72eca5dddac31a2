//! nexus-commit - AI commit messages from git diffs
//!
//! Filters noise out of the staged diff, ranks what is left, fits it to the
//! model's context window and turns the answers into one commit message.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod ai;
mod cli;
mod combine;
mod config;
mod core;
mod diff;
mod error;
mod filter;
mod pipeline;
mod select;
mod tokens;

/// nexus-commit - Commit messages that fit the context window
#[derive(Parser)]
#[command(name = "nexus-commit")]
#[command(author = "Mustafa Saraç <mustafa@mustafasarac.com>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AI commit messages from git diffs", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "NEXUS_COMMIT_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a commit message for the staged changes
    Commit {
        /// Execute the commit after generating message
        #[arg(short, long)]
        execute: bool,

        /// Conventional commit type the message must use
        #[arg(short = 't', long = "type")]
        commit_type: Option<String>,

        /// Conventional commit scope the message must use
        #[arg(short, long)]
        scope: Option<String>,
    },

    /// Show how a diff would be filtered, ranked and split, without calling a model
    Analyze {
        /// Diff file to read (defaults to stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Maintain the message cache
    Cache {
        #[command(subcommand)]
        action: cli::cache::CacheAction,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize configuration file
        #[arg(long)]
        init: bool,
    },

    /// Show version and system info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env("NEXUS_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;
    config.verbose = cli.verbose;

    debug!("nexus-commit v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(Commands::Commit { execute, commit_type, scope }) => {
            let options = cli::commit::CommitOptions {
                execute,
                commit_type,
                scope,
            };
            cli::commit::run(config, options).await?;
        }
        Some(Commands::Analyze { file, json }) => {
            cli::analyze::run(config, cli::analyze::AnalyzeOptions { file, json }).await?;
        }
        Some(Commands::Cache { action }) => {
            cli::cache::run(&config, action)?;
        }
        Some(Commands::Config { show, init }) => {
            if init {
                config::init_config()?;
            }
            if show || !init {
                config::show_config(&config)?;
            }
        }
        Some(Commands::Info) => {
            cli::info::run(&config)?;
        }
        None => {
            // Default: generate for the staged changes
            cli::commit::run(config, cli::commit::CommitOptions::default()).await?;
        }
    }

    Ok(())
}

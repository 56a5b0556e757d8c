//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod common;
pub mod config;
pub mod run;
pub mod sessions;
pub mod tools;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agentharness")]
#[command(version)]
#[command(about = "LLM agent turn loop with tool orchestration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent on a single message or interactively
    Run {
        /// Message to process (non-interactive mode)
        #[arg(short, long)]
        message: Option<String>,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
        /// Override agent.max_turns
        #[arg(long)]
        max_turns: Option<u32>,
    },
    /// List persisted sessions
    Sessions,
    /// Dump the events of a persisted session as JSON lines
    Events {
        /// Session id (see `sessions`)
        session_id: String,
    },
    /// List built-in tools
    Tools,
    /// Validate configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Check configuration for errors and warnings
    Check,
}

/// Entry point for the CLI, called from main().
pub async fn run() -> Result<()> {
    // Logging settings come from config; fall back to defaults when the
    // file is unreadable so `config check` can still report the problem.
    let logging_cfg = agentharness::config::Config::load()
        .map(|c| c.logging)
        .unwrap_or_default();
    agentharness::utils::logging::init_logging(&logging_cfg)?;

    let cli = Cli::parse();

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Run {
            message,
            json,
            max_turns,
        }) => {
            run::cmd_run(message, json, max_turns).await?;
        }
        Some(Commands::Sessions) => {
            sessions::cmd_sessions().await?;
        }
        Some(Commands::Events { session_id }) => {
            sessions::cmd_events(&session_id).await?;
        }
        Some(Commands::Tools) => {
            tools::cmd_tools()?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(action)?;
        }
        Some(Commands::Version) => {
            cmd_version();
        }
    }

    Ok(())
}

/// Display version information
fn cmd_version() {
    println!("agentharness {}", env!("CARGO_PKG_VERSION"));
}

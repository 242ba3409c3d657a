//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Procgate - run a command and reap it in the background
#[derive(Parser, Debug)]
#[command(name = "procgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Spawn a command, forward its stdio, and exit with its status
    Run(RunArgs),

    /// Show the launcher and native layer status
    Launcher {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Arguments for `procgate run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Set an environment variable (KEY=VALUE); may be repeated
    #[arg(short, long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Start from an empty environment
    #[arg(long)]
    pub clear_env: bool,

    /// Working directory for the command
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Kill the command after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Print a JSON report after the command exits
    #[arg(long)]
    pub json: bool,

    /// Command and its arguments
    #[arg(trailing_var_arg = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

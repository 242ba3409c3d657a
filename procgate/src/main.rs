//! Procgate - spawn a command and reap it in the background.
//!
//! The binary is a thin front end over the library:
//! - `run` spawns a command, forwards stdio, and exits with its status
//! - `launcher` reports launcher discovery and native layer status

mod cli;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    execute(cli).await
}

//! teamhub CLI - the offline-first team workspace from a terminal
//!
//! Every command works without a network; changes made offline are queued
//! and replayed by the next online command or `teamhub sync`.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::SessionOptions;
use crate::commands::completions::run_completions;
use crate::commands::files::run_files;
use crate::commands::members::run_members;
use crate::commands::messages::run_messages;
use crate::commands::queue::run_queue;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "teamhub=info".parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let options = SessionOptions::resolve(cli.db_path, cli.config, cli.offline)?;
    match cli.command {
        Commands::Status { json } => run_status(json, &options).await,
        Commands::Files { command } => run_files(command, &options).await,
        Commands::Messages { command } => run_messages(command, &options).await,
        Commands::Members { command } => run_members(command, &options).await,
        Commands::Queue { json } => run_queue(json, &options).await,
        Commands::Sync => run_sync(&options).await,
        Commands::Completions { .. } => Ok(()),
    }
}

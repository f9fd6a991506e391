// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ipcq - inspect and drive durable message queues

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod completions;
mod error;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{maintenance, queue};
use ipcq_core::ManagerConfig;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::error::CliError;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "ipcq", version, about = "Durable message queues on write-ahead logs")]
struct Cli {
    /// Queue directory (overrides the config file)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List queues in the directory
    List,
    /// Show the live messages of a queue
    Show(queue::ShowArgs),
    /// Add a message to a queue, creating it if needed
    Push(queue::PushArgs),
    /// Remove and print the head of a queue
    Pop(queue::PopArgs),
    /// Rewrite logs without consumed messages
    Compact(maintenance::CompactArgs),
    /// Check a queue log for damage without modifying it
    Verify(maintenance::VerifyArgs),
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<CliError>() {
                Some(cli_err) => eprint!("{}", cli_err),
                None => eprintln!("error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        completions::generate_completions::<Cli>(shell);
        return Ok(());
    }

    let config = load_config(&cli)?;
    let _log_guard = init_logging(&config, cli.verbose);
    tracing::debug!(dir = %config.wal_dir.display(), "using queue directory");

    match cli.command {
        Commands::List => queue::list(&config, cli.format),
        Commands::Show(args) => queue::show(&config, args, cli.format),
        Commands::Push(args) => queue::push(&config, args, cli.format),
        Commands::Pop(args) => queue::pop(&config, args, cli.format),
        Commands::Compact(args) => maintenance::compact(&config, args, cli.format),
        Commands::Verify(args) => maintenance::verify(&config, args, cli.format),
        Commands::Completions { .. } => Ok(()),
    }
}

fn load_config(cli: &Cli) -> Result<ManagerConfig> {
    let mut config = match &cli.config {
        Some(path) => ManagerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ManagerConfig::new(default_dir()),
    };
    if let Some(dir) = &cli.dir {
        config.wal_dir = dir.clone();
    }
    Ok(config)
}

fn default_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("ipcq"))
        .unwrap_or_else(|| PathBuf::from(".ipcq"))
}

/// Log to the configured file, or to stderr at the `-v` level
fn init_logging(
    config: &ManagerConfig,
    verbose: u8,
) -> Option<ipcq_core::logging::WorkerGuard> {
    let result = match &config.log_file {
        Some(path) => ipcq_core::logging::init_file(path, "info").map(Some),
        None => ipcq_core::logging::init_stderr(verbose).map(|()| None),
    };
    result.unwrap_or_else(|e| {
        eprintln!("warning: logging disabled: {}", e);
        None
    })
}

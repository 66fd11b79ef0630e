//! stash CLI - cache store maintenance.
//!
//! Provides commands for:
//! - `stats`: Count entries in a store
//! - `get`: Print one entry
//! - `purge`: Remove entries by name and/or characteristics
//! - `clear`: Remove every entry in a store
//! - `gc`: Remove entries older than a maximum age

mod commands;
mod error;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stash_config::{Backend, CliSettings, Config};
use tracing_subscriber::EnvFilter;

use commands::{ClearArgs, GcArgs, GetArgs, PurgeArgs, StatsArgs};
use error::CliError;
use output::Output;

/// stash - characteristic-indexed cache store.
#[derive(Parser)]
#[command(name = "stash", version, about)]
struct Cli {
    /// Path to configuration file (default: auto-discover stash.toml).
    #[arg(short, long, global = true, env = "STASH_CONFIG")]
    config: Option<PathBuf>,

    /// Store backend (overrides config).
    #[arg(long, global = true)]
    backend: Option<Backend>,

    /// File backend root directory (overrides config).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count entries in a store, expired ones included.
    Stats(StatsArgs),
    /// Print the entry stored under a name and characteristics.
    Get(GetArgs),
    /// Remove entries matching a name and/or characteristics.
    Purge(PurgeArgs),
    /// Remove every entry in a store.
    Clear(ClearArgs),
    /// Remove entries written longer ago than a maximum age.
    Gc(GcArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli, &output) {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

fn run(cli: Cli, output: &Output) -> Result<(), CliError> {
    let cli_settings = CliSettings {
        backend: cli.backend,
        cache_dir: cli.cache_dir,
        ..Default::default()
    };
    let config = Config::load(cli.config.as_deref(), Some(&cli_settings))?;

    match cli.command {
        Commands::Stats(args) => args.execute(&config, output),
        Commands::Get(args) => args.execute(&config, output),
        Commands::Purge(args) => args.execute(&config, output),
        Commands::Clear(args) => args.execute(&config, output),
        Commands::Gc(args) => args.execute(&config, output),
    }
}

// src/main.rs

//! Agent entry-point.
//!
//! 1. Parse arguments and load the TOML configuration
//! 2. Set up structured logging
//! 3. Register the device, run one command, unregister
//! 4. Print the resulting count (plain or JSON)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::Count;

use agent::commands::{self, Action};
use agent::config;
use agent::logging::setup_logging;

#[derive(Debug, Parser)]
#[command(name = "myioctl-agent")]
#[command(about = "Drive the myioctl counter device", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "myioctl.toml")]
    config: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reset the counter to zero
    Reset,
    /// Print the current counter value
    Get,
    /// Add DELTA to the counter
    Inc {
        #[arg(allow_hyphen_values = true)]
        delta: Count,
    },
    /// Hammer the device from several sessions at once
    Stress {
        #[arg(long, default_value_t = 4)]
        sessions: usize,
        #[arg(long, default_value_t = 1000)]
        iterations: usize,
    },
}

impl From<Commands> for Action {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Reset => Action::Reset,
            Commands::Get => Action::Get,
            Commands::Inc { delta } => Action::Increment(delta),
            Commands::Stress { sessions, iterations } => Action::Stress { sessions, iterations },
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let base_dir = cli.config.parent().unwrap_or(Path::new("."));
    setup_logging(base_dir, &cfg.logging).context("logging setup failed")?;
    match &cfg.source {
        Some(path) => log::info!("Loaded config from {:?}", path),
        None => log::info!("No config at {:?}, using defaults", cli.config),
    }

    let report = commands::execute(&cfg.device, cli.command.into())?;
    if cli.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}", report.count);
    }
    Ok(())
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

//! Pallet: rebuild derived geocoding locators and hot-swap them into service.
//!
//! # Usage
//!
//! ```text
//! pallet init
//! pallet check [--env <name>]
//! pallet plan --env <name> [--changes <file>] [--changed <source>]... [--force <artifact>]...
//! pallet run  --env <name> [--changes <file>] [--changed <source>]... [--force <artifact>]...
//!             [--log-file [<path>]] [--json]
//! pallet status [--env <name>] [--json]
//! ```
//!
//! `--config <file>` overrides `~/.pallet/locators.yaml` for every command.

mod commands;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    check::CheckArgs, init::InitArgs, plan::PlanArgs, run::RunArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "pallet",
    version,
    about = "Rebuild geocoding locators and swap them into live services",
    long_about = None,
)]
struct Cli {
    /// Config file to use instead of ~/.pallet/locators.yaml.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter config with Dev, Staging and Production environments.
    Init(InitArgs),

    /// Validate the config and check that live locators exist.
    Check(CheckArgs),

    /// Show which locators would be rebuilt and where they would be copied.
    Plan(PlanArgs),

    /// Rebuild dirty locators, gate their services, and distribute them.
    Run(RunArgs),

    /// Show the last run for each environment.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Commands::Run(args) => args.log_file()?,
        _ => None,
    };
    logging::init(cli.verbose, log_file.as_deref())?;

    let config = cli.config;
    match cli.command {
        Commands::Init(args) => args.run(config),
        Commands::Check(args) => args.run(config),
        Commands::Plan(args) => args.run(config),
        Commands::Run(args) => args.run(config),
        Commands::Status(args) => args.run(),
    }
}

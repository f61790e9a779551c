//! CLI entry point for the trendbook rebalancer.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use trendbook_rebalancer::config::Config;
use trendbook_rebalancer::error::Error;
use trendbook_rebalancer::execution::{self, RunOptions};

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Momentum portfolio rebalancer")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebalance on the configured schedule
    Run {
        /// Run a single cycle now and exit
        #[arg(long)]
        once: bool,

        /// Plan and log without submitting orders
        #[arg(long)]
        dry_run: bool,

        /// Liquidate everything before the first cycle
        #[arg(long)]
        liquidate: bool,

        /// Skip confirmation prompts (for automation)
        #[arg(long)]
        force: bool,
    },

    /// Rank the universe and show the plan without trading
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show current positions
    Positions,

    /// Check venue connection, clock and next fire time
    Status,

    /// Cancel all open orders and close all positions
    Liquidate {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Run {
            once,
            dry_run,
            liquidate,
            force,
        } => {
            let opts = RunOptions {
                once,
                dry_run,
                liquidate,
                force,
            };
            execution::run(&config, &opts)
        }
        Command::Plan { json } => execution::show_plan(&config, json),
        Command::Positions => execution::show_positions(&config),
        Command::Status => execution::check_status(&config),
        Command::Liquidate { force } => execution::liquidate(&config, force),
    };

    if let Err(e) = result {
        match &e {
            Error::Aborted(msg) => {
                eprintln!("{msg}");
                process::exit(0);
            }
            Error::Credentials(_) | Error::Config(_) | Error::Universe(_) | Error::UniverseRead { .. } => {
                eprintln!("Startup failed: {e}");
                process::exit(1);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}

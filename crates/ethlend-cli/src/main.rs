//! # ethlend CLI entry point
//!
//! Parses command-line arguments, initialises logging and dispatches to
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ethlend_cli::inspect::{run_config, run_states, StatesArgs};
use ethlend_cli::resolve_config;
use ethlend_cli::simulate::{run_simulate, SimulateArgs};
use ethlend_service::{ConfigError, ServiceConfig};

/// Operator tool for the collateralised lending request lifecycle.
#[derive(Parser, Debug)]
#[command(name = "ethlend", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file. Defaults to ETHLEND_* variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List lifecycle states, their codes and allowed transitions.
    States(StatesArgs),

    /// Print the effective service configuration.
    Config,

    /// Run a lending scenario against in-memory collaborators.
    Simulate(SimulateArgs),
}

/// Address used by `simulate` when no settlement address is configured.
const SIMULATION_ESCROW: &str = "0x00000000000000000000000000000000000e5c40";

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "ethlend CLI starting");

    let result = match cli.command {
        Commands::States(args) => run_states(&args),
        Commands::Config => {
            resolve_config(cli.config.as_deref()).and_then(|config| run_config(&config))
        }
        Commands::Simulate(args) => {
            simulation_config(cli.config.as_deref()).and_then(|config| run_simulate(&args, config))
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// Like [`resolve_config`], but falls back to a placeholder escrow address
/// when the environment names none.
fn simulation_config(path: Option<&std::path::Path>) -> anyhow::Result<ServiceConfig> {
    if path.is_some() {
        return resolve_config(path);
    }
    match ServiceConfig::from_env() {
        Ok(config) => Ok(config),
        Err(ConfigError::Missing(var)) => {
            tracing::info!(%var, escrow = SIMULATION_ESCROW, "no settlement address configured; using placeholder");
            Ok(ServiceConfig::new(SIMULATION_ESCROW.parse()?))
        }
        Err(e) => Err(e.into()),
    }
}

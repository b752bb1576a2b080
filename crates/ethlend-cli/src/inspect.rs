//! # Inspection Subcommands
//!
//! `states` prints the lifecycle reference table. `config` prints the
//! configuration a service would start with.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use ethlend_service::ServiceConfig;
use ethlend_state::LendingState;

/// Arguments for `ethlend states`.
#[derive(Args, Debug)]
pub struct StatesArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StateRow {
    code: u8,
    name: &'static str,
    terminal: bool,
    cancellable: bool,
    next: Vec<&'static str>,
}

fn state_rows() -> Vec<StateRow> {
    LendingState::ALL
        .iter()
        .map(|state| StateRow {
            code: state.code(),
            name: state.as_str(),
            terminal: state.is_terminal(),
            cancellable: state.is_cancellable(),
            next: state.valid_transitions().iter().map(|s| s.as_str()).collect(),
        })
        .collect()
}

/// Execute `ethlend states`.
pub fn run_states(args: &StatesArgs) -> Result<u8> {
    let rows = state_rows();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(0);
    }

    println!("{:<5} {:<20} {:<9} NEXT", "CODE", "STATE", "TERMINAL");
    for row in &rows {
        let next = if row.next.is_empty() {
            "-".to_string()
        } else {
            row.next.join(", ")
        };
        println!(
            "{:<5} {:<20} {:<9} {next}",
            row.code,
            row.name,
            if row.terminal { "yes" } else { "no" }
        );
    }
    Ok(0)
}

/// Execute `ethlend config`.
pub fn run_config(config: &ServiceConfig) -> Result<u8> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(0)
}

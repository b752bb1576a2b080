//! # ethlend-cli: CLI Tool for ethlend
//!
//! Provides the `ethlend` command-line interface.
//!
//! ## Subcommands
//!
//! - `ethlend states`: The lifecycle states, their codes and transitions.
//! - `ethlend config`: The effective service configuration.
//! - `ethlend simulate`: Drive one request through a scenario against
//!   in-memory collaborators and a manual clock.
//!
//! ```bash
//! ethlend states --json
//! ethlend --config ethlend.yaml config
//! ethlend -vv simulate --scenario default --days 3
//! ```

pub mod inspect;
pub mod simulate;

use std::path::Path;

use anyhow::{Context, Result};

use ethlend_service::ServiceConfig;

/// Load configuration from `path`, or from the environment when absent.
pub fn resolve_config(path: Option<&Path>) -> Result<ServiceConfig> {
    match path {
        Some(path) => ServiceConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => ServiceConfig::from_env().context("failed to load configuration from environment"),
    }
}

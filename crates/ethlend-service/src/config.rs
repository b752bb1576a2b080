//! Service configuration.
//!
//! Loaded from environment variables or a YAML file. Everything except the
//! settlement address has a default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ethlend_core::Address;
use ethlend_state::{DefaultPolicy, LifecyclePolicy, SECONDS_PER_DAY};

/// Listing fee charged when a request is created, in credits.
pub const DEFAULT_LISTING_FEE_CREDITS: u64 = 1;

/// Configuration for a [`LendingService`](crate::LendingService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Escrow account that receives collateral, loan funds and repayments.
    pub settlement_address: Address,
    /// Credits debited from the borrower per new request. Zero disables the fee.
    #[serde(default = "default_listing_fee")]
    pub listing_fee_credits: u64,
    /// When a lender may declare default.
    #[serde(default)]
    pub default_policy: DefaultPolicy,
    /// Length of one payback day in seconds. Shorter values are for staging.
    #[serde(default = "default_day_secs")]
    pub payback_day_secs: u64,
}

fn default_listing_fee() -> u64 {
    DEFAULT_LISTING_FEE_CREDITS
}

fn default_day_secs() -> u64 {
    SECONDS_PER_DAY
}

impl ServiceConfig {
    /// Defaults for everything but the settlement address.
    pub fn new(settlement_address: Address) -> Self {
        Self {
            settlement_address,
            listing_fee_credits: DEFAULT_LISTING_FEE_CREDITS,
            default_policy: DefaultPolicy::default(),
            payback_day_secs: SECONDS_PER_DAY,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ETHLEND_SETTLEMENT_ADDRESS` (required)
    /// - `ETHLEND_LISTING_FEE` (default: 1)
    /// - `ETHLEND_DEFAULT_POLICY` (`require_expiry` or `lender_discretion`, default: `require_expiry`)
    /// - `ETHLEND_PAYBACK_DAY_SECS` (default: 86400)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw = lookup("ETHLEND_SETTLEMENT_ADDRESS")
            .ok_or(ConfigError::Missing("ETHLEND_SETTLEMENT_ADDRESS"))?;
        let mut config = Self::new(parse_var("ETHLEND_SETTLEMENT_ADDRESS", &raw)?);

        if let Some(raw) = lookup("ETHLEND_LISTING_FEE") {
            config.listing_fee_credits = parse_var("ETHLEND_LISTING_FEE", &raw)?;
        }
        if let Some(raw) = lookup("ETHLEND_DEFAULT_POLICY") {
            config.default_policy = parse_var("ETHLEND_DEFAULT_POLICY", &raw)?;
        }
        if let Some(raw) = lookup("ETHLEND_PAYBACK_DAY_SECS") {
            config.payback_day_secs = parse_var("ETHLEND_PAYBACK_DAY_SECS", &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Guard configuration derived from this config.
    pub fn lifecycle_policy(&self) -> LifecyclePolicy {
        LifecyclePolicy {
            default_policy: self.default_policy,
            day_length_secs: self.payback_day_secs,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=SECONDS_PER_DAY).contains(&self.payback_day_secs) {
            return Err(ConfigError::Invalid {
                var: "payback_day_secs".to_string(),
                reason: format!(
                    "must be between 1 and {SECONDS_PER_DAY}, got {}",
                    self.payback_day_secs
                ),
            });
        }
        Ok(())
    }
}

fn parse_var<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

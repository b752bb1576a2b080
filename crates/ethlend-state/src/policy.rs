//! # Lifecycle Policy
//!
//! Operator-selected knobs that change guards without changing the state
//! graph: when a lender may declare default, and how long a "day" of the
//! payback window lasts (shortened in staging and simulation).

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ethlend_core::Timestamp;

/// Seconds in a calendar day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Unknown default-policy name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown default policy {0:?}; expected require_expiry or lender_discretion")]
pub struct UnknownDefaultPolicy(pub String);

/// When a lender may move a request from WAITING_FOR_PAYBACK to DEFAULT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPolicy {
    /// Only after the payback window has expired.
    #[default]
    RequireExpiry,
    /// At any time while waiting for payback.
    LenderDiscretion,
}

impl DefaultPolicy {
    /// The canonical policy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequireExpiry => "require_expiry",
            Self::LenderDiscretion => "lender_discretion",
        }
    }
}

impl std::str::FromStr for DefaultPolicy {
    type Err = UnknownDefaultPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "require_expiry" => Ok(Self::RequireExpiry),
            "lender_discretion" => Ok(Self::LenderDiscretion),
            other => Err(UnknownDefaultPolicy(other.to_string())),
        }
    }
}

impl std::fmt::Display for DefaultPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guard configuration applied to every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    /// Default guard.
    pub default_policy: DefaultPolicy,
    /// Length of one payback day, clamped to `1..=86_400` seconds.
    pub day_length_secs: u64,
}

impl LifecyclePolicy {
    /// Length of a payback window of `days` days.
    pub fn payback_window(&self, days: u32) -> Duration {
        // Clamped day length and u32 days keep this far below chrono's bound.
        let day = self.day_length_secs.clamp(1, SECONDS_PER_DAY) as i64;
        Duration::seconds(i64::from(days) * day)
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            default_policy: DefaultPolicy::default(),
            day_length_secs: SECONDS_PER_DAY,
        }
    }
}

/// Inputs to one transition: the current time and the active policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionContext {
    /// Time the event is applied.
    pub now: Timestamp,
    /// Guard configuration.
    pub policy: LifecyclePolicy,
}

impl TransitionContext {
    /// Context at `now` with the default policy.
    pub fn at(now: Timestamp) -> Self {
        Self {
            now,
            policy: LifecyclePolicy::default(),
        }
    }

    /// Replace the policy.
    pub fn with_policy(mut self, policy: LifecyclePolicy) -> Self {
        self.policy = policy;
        self
    }
}

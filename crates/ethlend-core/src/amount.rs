//! # Settlement Amounts
//!
//! `Amount` is an unsigned integer in the smallest settlement unit: wei for
//! the native asset, base units for collateral tokens. Arithmetic is checked
//! and returns [`CoreError::AmountOverflow`] instead of wrapping.
//!
//! Amounts serialize as decimal strings. Floats are never involved.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Wei in one ether.
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// A non-negative amount in the smallest settlement unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u128);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Wrap a raw unit count.
    pub const fn new(units: u128) -> Self {
        Self(units)
    }

    /// Whole ether expressed in wei.
    pub fn ether(whole: u64) -> Self {
        Self(u128::from(whole) * WEI_PER_ETHER)
    }

    /// The raw unit count.
    pub fn get(&self) -> u128 {
        self.0
    }

    /// Whether this amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AmountOverflow`] if the sum exceeds `u128::MAX`.
    pub fn checked_add(self, rhs: Amount) -> Result<Amount, CoreError> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or(CoreError::AmountOverflow {
                lhs: self.0,
                rhs: rhs.0,
            })
    }

    /// Subtraction floored at zero.
    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }

    /// Parse a decimal string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAmount`] for anything other than ASCII
    /// decimal digits (no sign, no fraction, no exponent).
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidAmount(s.to_string()));
        }
        s.parse::<u128>()
            .map(Amount)
            .map_err(|_| CoreError::InvalidAmount(s.to_string()))
    }
}

impl std::str::FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Amount {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.0.to_string()
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

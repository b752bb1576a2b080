//! # Error Types: Core Validation Failures
//!
//! Errors raised while constructing core primitives. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! Higher crates wrap [`CoreError`] in their own hierarchies via `#[from]`.

use thiserror::Error;

/// Error constructing or combining a core primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Address string is not a `0x`-prefixed 20-byte hex value.
    #[error("invalid address {value:?}: {reason}")]
    InvalidAddress {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Amount string is not a non-negative decimal integer.
    #[error("invalid amount {0:?}: expected a non-negative decimal integer")]
    InvalidAmount(String),

    /// Arithmetic on amounts left the representable range.
    #[error("amount overflow: {lhs} + {rhs}")]
    AmountOverflow {
        /// Left operand.
        lhs: u128,
        /// Right operand.
        rhs: u128,
    },

    /// Timestamp input could not be parsed or is out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Every ID space was tried and every candidate collided.
    #[error("identifier space exhausted after {attempts} attempts")]
    IdSpaceExhausted {
        /// Total number of candidates tried.
        attempts: u32,
    },
}

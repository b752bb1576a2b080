//! # Lending Request Lifecycle States
//!
//! The seven states of a lending request and their numeric codes. The
//! codes are the persisted representation and match the settlement
//! contract's state numbering.
//!
//! ## Transitions
//!
//! ```text
//! WAITING_FOR_DATA(0) ─setTerms─▶ WAITING_FOR_TOKENS(1) ─checkCollateral─▶ WAITING_FOR_LENDER(3)
//!                                                                             │         ▲
//!                                                                    lenderCommits  payout failed
//!                                                                             ▼         │
//!                                                                  WAITING_FOR_PAYBACK(4)
//!                                                                     │              │
//!                                                              requestDefault      repay
//!                                                                     ▼              ▼
//!                                                                 DEFAULT(5)    FINISHED(6)
//!
//! cancel: WAITING_FOR_DATA | WAITING_FOR_TOKENS | WAITING_FOR_LENDER ─▶ CANCELLED(2)
//! ```
//!
//! Terminal states: CANCELLED, DEFAULT, FINISHED.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A persisted state code outside `0..=6`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown lending state code {0}")]
pub struct UnknownStateCode(pub u8);

/// Lifecycle state of a lending request.
///
/// Serialized as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum LendingState {
    /// Created by the borrower; terms not yet supplied.
    WaitingForData = 0,
    /// Terms set; collecting collateral tokens.
    WaitingForTokens = 1,
    /// Withdrawn before a lender committed. Terminal state.
    Cancelled = 2,
    /// Collateral sufficient; listed for lenders.
    WaitingForLender = 3,
    /// Loan paid out; payback window running.
    WaitingForPayback = 4,
    /// Borrower did not repay; collateral forfeited to the lender. Terminal state.
    Default = 5,
    /// Loan repaid in full; collateral released. Terminal state.
    Finished = 6,
}

impl LendingState {
    /// Every state, in code order.
    pub const ALL: [LendingState; 7] = [
        Self::WaitingForData,
        Self::WaitingForTokens,
        Self::Cancelled,
        Self::WaitingForLender,
        Self::WaitingForPayback,
        Self::Default,
        Self::Finished,
    ];

    /// The persisted numeric code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a state by numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Whether this state is terminal (no further lifecycle transitions).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Default | Self::Finished)
    }

    /// Whether a cancel request can be accepted in this state.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            Self::WaitingForData | Self::WaitingForTokens | Self::WaitingForLender
        )
    }

    /// The canonical state name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WaitingForData => "WAITING_FOR_DATA",
            Self::WaitingForTokens => "WAITING_FOR_TOKENS",
            Self::Cancelled => "CANCELLED",
            Self::WaitingForLender => "WAITING_FOR_LENDER",
            Self::WaitingForPayback => "WAITING_FOR_PAYBACK",
            Self::Default => "DEFAULT",
            Self::Finished => "FINISHED",
        }
    }

    /// States reachable from this one in a single transition.
    pub fn valid_transitions(self) -> &'static [LendingState] {
        match self {
            Self::WaitingForData => &[Self::WaitingForTokens, Self::Cancelled],
            Self::WaitingForTokens => &[Self::WaitingForLender, Self::Cancelled],
            Self::WaitingForLender => &[Self::WaitingForPayback, Self::Cancelled],
            Self::WaitingForPayback => &[Self::Finished, Self::Default, Self::WaitingForLender],
            Self::Cancelled | Self::Default | Self::Finished => &[],
        }
    }
}

impl From<LendingState> for u8 {
    fn from(state: LendingState) -> Self {
        state.code()
    }
}

impl TryFrom<u8> for LendingState {
    type Error = UnknownStateCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(UnknownStateCode(code))
    }
}

impl std::fmt::Display for LendingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

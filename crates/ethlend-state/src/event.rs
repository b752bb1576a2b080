//! # Lifecycle Events
//!
//! Everything that can happen to a lending request arrives as a
//! [`LendingEvent`]: user actions (set terms, cancel, commit, repay,
//! request default), ledger observations (collateral deposits) and
//! settlement outcomes reported back by the gateway.

use serde::{Deserialize, Serialize};

use ethlend_core::{Address, Amount, DepositId, Timestamp, TransferHandle, UserId};

use crate::terms::LoanTerms;

/// Who is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    /// A marketplace user.
    User(UserId),
    /// The platform operator.
    Platform,
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "{id}"),
            Self::Platform => f.write_str("platform"),
        }
    }
}

/// An event submitted to a lending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LendingEvent {
    /// The borrower supplies the loan terms and their payout address.
    SetTerms {
        /// Loan terms.
        terms: LoanTerms,
        /// Where the principal and released collateral go.
        borrower_address: Address,
    },
    /// A collateral-token transfer into escrow was observed.
    DepositObserved {
        /// External event identity, used for deduplication.
        deposit_id: DepositId,
        /// Token amount observed.
        amount: Amount,
        /// Sender of the tokens.
        source_address: Address,
        /// When the transfer was observed.
        observed_at: Timestamp,
    },
    /// Check whether the collateral requirement is met.
    CheckCollateral,
    /// Withdraw the request.
    Cancel {
        /// Who asks.
        actor: Actor,
    },
    /// A lender funded the loan.
    LenderCommits {
        /// The lender.
        lender_id: UserId,
        /// Where repayment and forfeited collateral go.
        lender_address: Address,
        /// Amount received from the lender, in wei.
        amount: Amount,
    },
    /// The borrower repaid.
    Repay {
        /// Amount received, in wei.
        amount: Amount,
    },
    /// The lender claims the collateral.
    RequestDefault {
        /// Who asks.
        actor: Actor,
    },
    /// The gateway settled a submitted transfer.
    SettlementConfirmed {
        /// Gateway handle.
        handle: TransferHandle,
    },
    /// The gateway failed a submitted transfer.
    SettlementFailed {
        /// Gateway handle.
        handle: TransferHandle,
        /// Gateway-supplied reason.
        reason: String,
    },
}

impl LendingEvent {
    /// The canonical event name, as it appears in errors and the
    /// transition log.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetTerms { .. } => "set_terms",
            Self::DepositObserved { .. } => "deposit_observed",
            Self::CheckCollateral => "check_collateral",
            Self::Cancel { .. } => "cancel",
            Self::LenderCommits { .. } => "lender_commits",
            Self::Repay { .. } => "repay",
            Self::RequestDefault { .. } => "request_default",
            Self::SettlementConfirmed { .. } => "settlement_confirmed",
            Self::SettlementFailed { .. } => "settlement_failed",
        }
    }

    /// Whether this event reports a settlement outcome rather than a
    /// lifecycle action.
    pub fn is_settlement_report(&self) -> bool {
        matches!(
            self,
            Self::SettlementConfirmed { .. } | Self::SettlementFailed { .. }
        )
    }
}

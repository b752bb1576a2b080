//! # Side-Effect Intents
//!
//! Transitions do not move money. They return intents that the surrounding
//! service executes against external collaborators: transfer intents go to
//! the settlement gateway, balance intents go to the balance ledger. The
//! state machine records what was asked for. Submission, retry and
//! confirmation belong to the collaborators.

use serde::{Deserialize, Serialize};

use ethlend_core::{Address, Amount, TransferHandle, Timestamp, UserId};

use crate::terms::CollateralToken;

/// Asset moved by a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetKind {
    /// The settlement layer's native currency (ETH, in wei).
    Native,
    /// A collateral token.
    Token(CollateralToken),
}

/// Why a transfer is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPurpose {
    /// Loan principal from escrow to the borrower.
    PayBorrower,
    /// Principal plus premium from escrow to the lender.
    PayLender,
    /// Collateral back to the borrower after cancellation.
    RefundCollateral,
    /// Collateral above the requirement back to its sender.
    RefundExcessCollateral,
    /// Collateral back to the borrower after repayment.
    ReleaseCollateral,
    /// Collateral to the lender after default.
    ForfeitCollateral,
    /// Principal back to the lender after a failed payout.
    RefundLender,
}

impl TransferPurpose {
    /// The canonical purpose name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PayBorrower => "pay_borrower",
            Self::PayLender => "pay_lender",
            Self::RefundCollateral => "refund_collateral",
            Self::RefundExcessCollateral => "refund_excess_collateral",
            Self::ReleaseCollateral => "release_collateral",
            Self::ForfeitCollateral => "forfeit_collateral",
            Self::RefundLender => "refund_lender",
        }
    }
}

impl std::fmt::Display for TransferPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested on-chain transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferIntent {
    /// Why the transfer is requested.
    pub purpose: TransferPurpose,
    /// Paying account (the request's settlement address).
    pub from: Address,
    /// Receiving account.
    pub to: Address,
    /// Amount in the asset's base unit.
    pub amount: Amount,
    /// What is moved.
    pub asset: AssetKind,
}

/// Direction of a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceDirection {
    /// Subtract from the user's balance.
    Debit,
    /// Add to the user's balance.
    Credit,
}

/// A requested change to a user's off-chain credit balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceIntent {
    /// Whose balance changes.
    pub user: UserId,
    /// Debit or credit.
    pub direction: BalanceDirection,
    /// Number of credits.
    pub credits: u64,
    /// Human-readable reason, recorded by the ledger.
    pub reason: String,
}

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Move funds or tokens through the settlement gateway.
    Transfer(TransferIntent),
    /// Adjust a user's credit balance through the balance ledger.
    Balance(BalanceIntent),
}

impl Intent {
    /// The transfer intent, if this is one.
    pub fn as_transfer(&self) -> Option<&TransferIntent> {
        match self {
            Self::Transfer(t) => Some(t),
            Self::Balance(_) => None,
        }
    }
}

// ── Settlement tracking ─────────────────────────────────────────────

/// Lifecycle of a submitted transfer as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferStatus {
    /// Accepted by the gateway; outcome not yet reported.
    Pending,
    /// Settled on the ledger.
    Confirmed,
    /// The gateway reported failure.
    Failed {
        /// Gateway-supplied reason.
        reason: String,
    },
    /// The gateway refused the submission outright.
    Rejected {
        /// Gateway-supplied reason.
        reason: String,
    },
}

impl TransferStatus {
    /// Whether an outcome is known.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A transfer intent together with its gateway handle and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTransfer {
    /// Gateway handle.
    pub handle: TransferHandle,
    /// What was requested.
    pub intent: TransferIntent,
    /// Latest known status.
    pub status: TransferStatus,
    /// When the intent was submitted.
    pub submitted_at: Timestamp,
    /// When the outcome was reported.
    pub settled_at: Option<Timestamp>,
}

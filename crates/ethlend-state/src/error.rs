//! # State Machine Error Types
//!
//! Every rejection carries the current state, the event name and the
//! reason, so a caller can diagnose an integration bug from the error
//! alone. A rejected event never changes the request.

use thiserror::Error;

use ethlend_core::{RequestId, TransferHandle};

use crate::collateral::CollateralError;
use crate::lifecycle::LendingState;
use crate::terms::TermsError;
use crate::timeout::TimeoutError;

/// Errors arising from applying an event to a lending request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The event is not valid in the current state, or its guard failed.
    #[error("cannot apply {event} in state {state}: {reason}")]
    InvalidTransition {
        /// The current state.
        state: LendingState,
        /// The rejected event.
        event: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// `set_terms` supplied malformed terms.
    #[error("invalid terms: {0}")]
    TermsValidation(#[from] TermsError),

    /// Collateral deposit rejected by the tracker.
    #[error(transparent)]
    Collateral(#[from] CollateralError),

    /// Timeout window misuse.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// A settlement report named a handle this request never submitted.
    #[error("{handle} is not tracked by this request")]
    UnknownTransfer {
        /// The unknown handle.
        handle: TransferHandle,
    },

    /// A settlement report contradicts the outcome already recorded.
    #[error("{handle} already settled as {recorded}")]
    ConflictingSettlement {
        /// The transfer handle.
        handle: TransferHandle,
        /// The outcome already on record.
        recorded: String,
    },

    /// Only transfers the gateway refused at submission can be resubmitted.
    #[error("{handle} is {status}, only rejected transfers can be resubmitted")]
    TransferNotRetryable {
        /// The transfer handle.
        handle: TransferHandle,
        /// Its current status.
        status: String,
    },

    /// A loaded snapshot violates a structural invariant.
    #[error("corrupt snapshot for {request_id}: {reason}")]
    CorruptSnapshot {
        /// The request whose snapshot is corrupt.
        request_id: RequestId,
        /// The violated invariant.
        reason: String,
    },
}

impl StateError {
    /// Whether this error is a replayed deposit observation, which callers
    /// treat as a no-op.
    pub fn is_duplicate_deposit(&self) -> bool {
        matches!(
            self,
            Self::Collateral(CollateralError::DuplicateDeposit { .. })
        )
    }
}

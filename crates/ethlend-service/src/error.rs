//! # Service Error Types
//!
//! Lifecycle rejections pass through unchanged as [`ServiceError::State`].
//! Repository errors that callers routinely branch on (`NotFound`,
//! `VersionConflict`, corrupt snapshots) are lifted to top-level variants.

use thiserror::Error;

use ethlend_core::{CoreError, RequestId, TransferHandle};
use ethlend_settlement::{GatewayError, LedgerError};
use ethlend_state::StateError;

use crate::repository::RepositoryError;

/// Errors returned by [`LendingService`](crate::LendingService).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// No request with this ID.
    #[error("{id} not found")]
    NotFound { id: RequestId },

    /// The stored request changed between load and save.
    #[error("{id} was modified concurrently: expected version {expected}, found {actual}")]
    VersionConflict {
        id: RequestId,
        expected: u64,
        actual: u64,
    },

    /// The stored snapshot failed decoding or validation.
    #[error("corrupt snapshot for {id}: {reason}")]
    CorruptSnapshot { id: RequestId, reason: String },

    /// Every candidate request ID collided.
    #[error("no free request id after {attempts} attempts")]
    IdSpaceExhausted { attempts: u32 },

    /// A foundational type rejected its input.
    #[error(transparent)]
    Core(CoreError),

    /// No request submitted this transfer.
    #[error("{handle} does not belong to any request")]
    UnknownTransfer { handle: TransferHandle },

    /// The state machine rejected the event.
    #[error(transparent)]
    State(#[from] StateError),

    /// Other persistence failures.
    #[error("repository error: {0}")]
    Repository(RepositoryError),

    /// The balance ledger refused an intent.
    #[error("balance ledger: {0}")]
    Ledger(#[from] LedgerError),

    /// The settlement gateway refused a resubmission.
    #[error("settlement gateway: {0}")]
    Gateway(#[from] GatewayError),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { id } => Self::NotFound { id },
            RepositoryError::VersionConflict {
                id,
                expected,
                actual,
            } => Self::VersionConflict {
                id,
                expected,
                actual,
            },
            RepositoryError::Corrupt { id, reason } => Self::CorruptSnapshot { id, reason },
            other => Self::Repository(other),
        }
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::IdSpaceExhausted { attempts } => Self::IdSpaceExhausted { attempts },
            other => Self::Core(other),
        }
    }
}

impl ServiceError {
    /// Whether the error is an invalid-transition rejection.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::State(StateError::InvalidTransition { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_lift() {
        let id = RequestId::from_raw(4);
        assert_eq!(
            ServiceError::from(RepositoryError::NotFound { id }),
            ServiceError::NotFound { id }
        );
        assert!(matches!(
            ServiceError::from(RepositoryError::Corrupt {
                id,
                reason: "x".into()
            }),
            ServiceError::CorruptSnapshot { .. }
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::AlreadyExists { id }),
            ServiceError::Repository(_)
        ));
    }

    #[test]
    fn id_exhaustion_lifts() {
        assert_eq!(
            ServiceError::from(CoreError::IdSpaceExhausted { attempts: 48 }),
            ServiceError::IdSpaceExhausted { attempts: 48 }
        );
    }

    #[test]
    fn state_errors_display_transparently() {
        let err = ServiceError::from(StateError::InvalidTransition {
            state: ethlend_state::LendingState::Cancelled,
            event: "cancel",
            reason: "request is in a terminal state".into(),
        });
        assert!(err.is_invalid_transition());
        assert_eq!(
            err.to_string(),
            "cannot apply cancel in state CANCELLED: request is in a terminal state"
        );
    }
}

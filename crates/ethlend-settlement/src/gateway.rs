//! # Settlement Gateway
//!
//! Defines the [`SettlementGateway`] trait through which transfer intents
//! leave the system. A gateway accepts a transfer and hands back a
//! [`TransferHandle`]; the eventual outcome comes back later as a
//! confirmation or failure event keyed by that handle.
//!
//! ## Implementations
//!
//! | Gateway | Description |
//! |---------|-------------|
//! | [`InMemoryGateway`] | Records submissions; used by tests and the simulator |
//!
//! ## Design Rationale
//!
//! Methods are synchronous. The lifecycle core is synchronous and the
//! in-memory gateway performs no I/O. A chain-backed gateway would queue the
//! transfer and return immediately, so submission latency stays bounded.

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use ethlend_core::{Address, Amount, TransferHandle};
use ethlend_state::AssetKind;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors returned when submitting a transfer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway refused the transfer. Retrying will not help.
    #[error("transfer rejected by {gateway}: {reason}")]
    Rejected {
        /// Which gateway refused.
        gateway: String,
        /// Gateway-supplied reason.
        reason: String,
    },

    /// The gateway could not be reached. The transfer was not accepted.
    #[error("settlement gateway unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Contract for submitting transfers to a settlement layer.
///
/// The trait is object-safe (`Send + Sync`) so the service can hold it as
/// `Arc<dyn SettlementGateway>`.
pub trait SettlementGateway: Send + Sync {
    /// Human-readable gateway name, used in logs and errors.
    fn gateway_name(&self) -> &str;

    /// Submit a transfer for settlement.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Rejected`] if the gateway refuses the
    /// transfer, [`GatewayError::Unavailable`] if it cannot be reached.
    fn submit_transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
        asset: &AssetKind,
    ) -> Result<TransferHandle, GatewayError>;
}

// ---------------------------------------------------------------------------
// In-memory gateway
// ---------------------------------------------------------------------------

/// A transfer accepted by [`InMemoryGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedTransfer {
    pub handle: TransferHandle,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub asset: AssetKind,
}

#[derive(Debug, Default)]
struct GatewayInner {
    submitted: Vec<SubmittedTransfer>,
    reject_next: Option<String>,
    unavailable: bool,
}

/// Gateway that accepts every transfer and remembers it.
///
/// Failure injection: [`reject_next`](Self::reject_next) refuses the next
/// submission once, [`set_unavailable`](Self::set_unavailable) refuses all
/// submissions until cleared.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    inner: Mutex<GatewayInner>,
}

impl InMemoryGateway {
    /// Create an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next submission with `reason`.
    pub fn reject_next(&self, reason: impl Into<String>) {
        self.inner.lock().reject_next = Some(reason.into());
    }

    /// Toggle simulated unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    /// All accepted transfers, in submission order.
    pub fn submitted(&self) -> Vec<SubmittedTransfer> {
        self.inner.lock().submitted.clone()
    }

    /// Look up an accepted transfer.
    pub fn find(&self, handle: TransferHandle) -> Option<SubmittedTransfer> {
        self.inner
            .lock()
            .submitted
            .iter()
            .find(|t| t.handle == handle)
            .cloned()
    }
}

impl SettlementGateway for InMemoryGateway {
    fn gateway_name(&self) -> &str {
        "in-memory"
    }

    fn submit_transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
        asset: &AssetKind,
    ) -> Result<TransferHandle, GatewayError> {
        let mut inner = self.inner.lock();
        if inner.unavailable {
            return Err(GatewayError::Unavailable(
                "in-memory gateway switched off".into(),
            ));
        }
        if let Some(reason) = inner.reject_next.take() {
            tracing::debug!(%to, %amount, %reason, "in-memory gateway rejecting transfer");
            return Err(GatewayError::Rejected {
                gateway: self.gateway_name().to_string(),
                reason,
            });
        }

        let handle = TransferHandle::new();
        inner.submitted.push(SubmittedTransfer {
            handle,
            from: from.clone(),
            to: to.clone(),
            amount,
            asset: asset.clone(),
        });
        tracing::debug!(%handle, %from, %to, %amount, "transfer accepted");
        Ok(handle)
    }
}

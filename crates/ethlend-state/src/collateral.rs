//! # Collateral Tracker
//!
//! Tracks confirmed collateral-token deposits for one lending request and
//! reports whether they cover a required amount.
//!
//! ## Invariants
//!
//! - Deposits are append-only. A recorded deposit is never mutated or
//!   removed, so once `is_sufficient(required)` holds it keeps holding.
//! - Each external deposit identity is credited at most once. A replayed
//!   observation fails with [`CollateralError::DuplicateDeposit`], which
//!   callers treat as a no-op.
//! - The credited total never exceeds the tracker's cap. The part of a
//!   deposit above the cap is reported as `excess` on the receipt so the
//!   state machine can route it to a refund.
//!
//! The tracker never changes lifecycle state; the state machine reads it
//! as a guard.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ethlend_core::{Address, Amount, DepositId, Timestamp};

/// Error recording a collateral deposit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollateralError {
    /// The deposit identity was already recorded.
    #[error("{deposit_id} already recorded")]
    DuplicateDeposit {
        /// The replayed deposit identity.
        deposit_id: DepositId,
    },
}

/// An observed collateral-token transfer into escrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralDeposit {
    /// External event identity of the transfer.
    pub deposit_id: DepositId,
    /// Amount observed on the ledger.
    pub amount: Amount,
    /// Part of `amount` counted toward the collateral requirement.
    pub credited: Amount,
    /// Account the tokens came from.
    pub source_address: Address,
    /// When the transfer was observed.
    pub observed_at: Timestamp,
}

/// Outcome of recording one deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositReceipt {
    /// Counted toward the requirement.
    pub credited: Amount,
    /// Above the cap; owed back to the depositor.
    pub excess: Amount,
    /// Credited total after this deposit.
    pub total: Amount,
}

/// Append-only record of collateral deposits for one lending request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralTracker {
    cap: Amount,
    deposits: Vec<CollateralDeposit>,
}

impl CollateralTracker {
    /// Create an empty tracker that credits at most `cap`.
    pub fn new(cap: Amount) -> Self {
        Self {
            cap,
            deposits: Vec::new(),
        }
    }

    /// Record an observed deposit.
    ///
    /// # Errors
    ///
    /// Returns [`CollateralError::DuplicateDeposit`] if `deposit_id` was
    /// already recorded. Nothing is appended in that case.
    pub fn record_deposit(
        &mut self,
        deposit_id: DepositId,
        amount: Amount,
        source_address: Address,
        observed_at: Timestamp,
    ) -> Result<DepositReceipt, CollateralError> {
        if self.contains(&deposit_id) {
            return Err(CollateralError::DuplicateDeposit { deposit_id });
        }
        let room = self.cap.saturating_sub(self.total_deposited());
        let credited = amount.min(room);
        let excess = amount.saturating_sub(credited);
        self.deposits.push(CollateralDeposit {
            deposit_id,
            amount,
            credited,
            source_address,
            observed_at,
        });
        Ok(DepositReceipt {
            credited,
            excess,
            total: self.total_deposited(),
        })
    }

    /// Whether `deposit_id` has been recorded.
    pub fn contains(&self, deposit_id: &DepositId) -> bool {
        self.deposits.iter().any(|d| &d.deposit_id == deposit_id)
    }

    /// Cumulative credited collateral.
    pub fn total_deposited(&self) -> Amount {
        Amount::new(
            self.deposits
                .iter()
                .fold(0u128, |acc, d| acc.saturating_add(d.credited.get())),
        )
    }

    /// Whether the credited total covers `required`.
    pub fn is_sufficient(&self, required: Amount) -> bool {
        self.total_deposited() >= required
    }

    /// Maximum amount this tracker will credit.
    pub fn cap(&self) -> Amount {
        self.cap
    }

    /// All recorded deposits, in observation order.
    pub fn deposits(&self) -> &[CollateralDeposit] {
        &self.deposits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> Address {
        Address::parse("0x2222222222222222222222222222222222222222").unwrap()
    }

    fn at() -> Timestamp {
        Timestamp::parse("2026-02-01T10:00:00Z").unwrap()
    }

    fn tracker() -> CollateralTracker {
        CollateralTracker::new(Amount::new(10))
    }

    #[test]
    fn deposits_accumulate() {
        let mut t = tracker();
        t.record_deposit(DepositId::new("tx1:0"), Amount::new(1), source(), at())
            .unwrap();
        let receipt = t
            .record_deposit(DepositId::new("tx2:0"), Amount::new(9), source(), at())
            .unwrap();
        assert_eq!(receipt.total, Amount::new(10));
        assert_eq!(receipt.excess, Amount::ZERO);
        assert_eq!(t.deposits().len(), 2);
    }

    #[test]
    fn sufficiency_tracks_total() {
        let mut t = tracker();
        assert!(!t.is_sufficient(Amount::new(10)));
        t.record_deposit(DepositId::new("tx1:0"), Amount::new(4), source(), at())
            .unwrap();
        assert!(!t.is_sufficient(Amount::new(10)));
        assert!(t.is_sufficient(Amount::new(4)));
        t.record_deposit(DepositId::new("tx2:0"), Amount::new(6), source(), at())
            .unwrap();
        assert!(t.is_sufficient(Amount::new(10)));
    }

    #[test]
    fn duplicate_deposit_rejected_without_append() {
        let mut t = tracker();
        t.record_deposit(DepositId::new("tx1:0"), Amount::new(3), source(), at())
            .unwrap();
        let err = t
            .record_deposit(DepositId::new("tx1:0"), Amount::new(3), source(), at())
            .unwrap_err();
        assert_eq!(
            err,
            CollateralError::DuplicateDeposit {
                deposit_id: DepositId::new("tx1:0")
            }
        );
        assert_eq!(t.total_deposited(), Amount::new(3));
        assert_eq!(t.deposits().len(), 1);
    }

    #[test]
    fn overflow_is_reported_as_excess() {
        let mut t = tracker();
        t.record_deposit(DepositId::new("tx1:0"), Amount::new(8), source(), at())
            .unwrap();
        let receipt = t
            .record_deposit(DepositId::new("tx2:0"), Amount::new(5), source(), at())
            .unwrap();
        assert_eq!(receipt.credited, Amount::new(2));
        assert_eq!(receipt.excess, Amount::new(3));
        assert_eq!(t.total_deposited(), t.cap());
    }

    #[test]
    fn deposit_after_cap_is_all_excess_but_still_deduplicated() {
        let mut t = tracker();
        t.record_deposit(DepositId::new("tx1:0"), Amount::new(10), source(), at())
            .unwrap();
        let receipt = t
            .record_deposit(DepositId::new("tx2:0"), Amount::new(7), source(), at())
            .unwrap();
        assert_eq!(receipt.credited, Amount::ZERO);
        assert_eq!(receipt.excess, Amount::new(7));
        assert!(t
            .record_deposit(DepositId::new("tx2:0"), Amount::new(7), source(), at())
            .is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn credited_total_never_exceeds_cap(
                cap in 0u128..1_000,
                amounts in proptest::collection::vec(0u128..500, 0..20),
            ) {
                let mut t = CollateralTracker::new(Amount::new(cap));
                for (i, a) in amounts.iter().enumerate() {
                    let receipt = t
                        .record_deposit(DepositId::new(format!("tx{i}")), Amount::new(*a), source(), at())
                        .unwrap();
                    prop_assert_eq!(receipt.credited.get() + receipt.excess.get(), *a);
                    prop_assert!(t.total_deposited().get() <= cap);
                }
            }

            #[test]
            fn sufficiency_is_monotonic(
                required in 0u128..200,
                amounts in proptest::collection::vec(0u128..50, 0..20),
            ) {
                let mut t = CollateralTracker::new(Amount::new(1_000));
                let mut was_sufficient = t.is_sufficient(Amount::new(required));
                for (i, a) in amounts.iter().enumerate() {
                    t.record_deposit(DepositId::new(format!("tx{i}")), Amount::new(*a), source(), at())
                        .unwrap();
                    let now_sufficient = t.is_sufficient(Amount::new(required));
                    prop_assert!(!was_sufficient || now_sufficient);
                    was_sufficient = now_sufficient;
                }
            }
        }
    }
}

//! # Balance Ledger
//!
//! Off-chain credit balances, keyed by user. The lifecycle core never
//! touches a balance; it emits [`BalanceIntent`]s and the service applies
//! them here. Each intent is applied atomically and a debit that would take
//! a balance below zero is refused.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use ethlend_core::UserId;
use ethlend_state::{BalanceDirection, BalanceIntent};

/// Errors applying a balance intent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The debit exceeds the user's balance.
    #[error("{user} has {balance} credits, {requested} requested")]
    InsufficientBalance {
        user: UserId,
        balance: u64,
        requested: u64,
    },

    /// The credit would overflow the balance.
    #[error("balance overflow for {user}")]
    Overflow { user: UserId },
}

/// Contract for applying balance intents.
pub trait BalanceLedger: Send + Sync {
    /// Apply one intent. Returns the balance after the change.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientBalance`] for a debit larger than the
    /// balance; [`LedgerError::Overflow`] for a credit past `u64::MAX`.
    fn apply(&self, intent: &BalanceIntent) -> Result<u64, LedgerError>;

    /// Current balance; zero for unknown users.
    fn balance(&self, user: UserId) -> u64;
}

/// One applied intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub user: UserId,
    pub direction: BalanceDirection,
    pub credits: u64,
    pub reason: String,
    pub balance_after: u64,
}

#[derive(Debug, Default)]
struct LedgerInner {
    balances: HashMap<UserId, u64>,
    entries: Vec<LedgerEntry>,
}

/// Ledger held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryBalanceLedger {
    inner: Mutex<LedgerInner>,
}

impl InMemoryBalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user's starting balance.
    pub fn open_account(&self, user: UserId, credits: u64) {
        self.inner.lock().balances.insert(user, credits);
    }

    /// Applied intents, oldest first.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.inner.lock().entries.clone()
    }
}

impl BalanceLedger for InMemoryBalanceLedger {
    fn apply(&self, intent: &BalanceIntent) -> Result<u64, LedgerError> {
        let mut inner = self.inner.lock();
        let balance = inner.balances.get(&intent.user).copied().unwrap_or(0);
        let after = match intent.direction {
            BalanceDirection::Debit => {
                balance
                    .checked_sub(intent.credits)
                    .ok_or(LedgerError::InsufficientBalance {
                        user: intent.user,
                        balance,
                        requested: intent.credits,
                    })?
            }
            BalanceDirection::Credit => balance
                .checked_add(intent.credits)
                .ok_or(LedgerError::Overflow { user: intent.user })?,
        };
        inner.balances.insert(intent.user, after);
        inner.entries.push(LedgerEntry {
            user: intent.user,
            direction: intent.direction,
            credits: intent.credits,
            reason: intent.reason.clone(),
            balance_after: after,
        });
        tracing::debug!(user = %intent.user, direction = ?intent.direction, credits = intent.credits, balance = after, "balance intent applied");
        Ok(after)
    }

    fn balance(&self, user: UserId) -> u64 {
        self.inner.lock().balances.get(&user).copied().unwrap_or(0)
    }
}

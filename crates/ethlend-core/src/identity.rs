//! # Domain Identity Newtypes
//!
//! Newtype wrappers for all identifiers in ethlend. These prevent
//! accidental identifier confusion: a `UserId` cannot be passed where a
//! `RequestId` is expected.
//!
//! Request and user identifiers are short numeric IDs (see
//! [`crate::id_alloc`]). Deposit identities come from the external ledger
//! that observed the transfer. Transfer handles are issued by the
//! settlement gateway.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a lending request. Assigned at creation, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Wrap a raw numeric identifier.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric identifier.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lr:{}", self.0)
    }
}

/// Identifier of a marketplace user (borrower or lender).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    /// Wrap a raw numeric identifier.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric identifier.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// External event identity of an observed collateral deposit
/// (for example `"<tx-hash>:<log-index>"`).
///
/// Collateral deposits are deduplicated on this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepositId(String);

impl DepositId {
    /// Wrap an external event identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DepositId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deposit:{}", self.0)
    }
}

/// Handle for a transfer submitted to the settlement gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferHandle(Uuid);

impl TransferHandle {
    /// Create a new random transfer handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransferHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transfer:{}", self.0)
    }
}

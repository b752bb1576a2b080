//! # ethlend-settlement: External Collaborators
//!
//! The two contracts the lifecycle service executes intents against:
//!
//! - [`SettlementGateway`]: moves ETH and collateral tokens. Returns a
//!   handle per transfer; outcomes come back as events.
//! - [`BalanceLedger`]: adjusts off-chain credit balances.
//!
//! Both ship with in-memory implementations for tests and local simulation.

pub mod gateway;
pub mod ledger;

pub use gateway::{GatewayError, InMemoryGateway, SettlementGateway, SubmittedTransfer};
pub use ledger::{BalanceLedger, InMemoryBalanceLedger, LedgerEntry, LedgerError};

//! # ethlend-core: Foundational Types for ethlend
//!
//! This crate defines the primitives every other ethlend crate builds on.
//! It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `RequestId`, `UserId`,
//!    `DepositId`, `TransferHandle` are distinct types. A user ID cannot be
//!    passed where a request ID is expected.
//!
//! 2. **Integer amounts only.** `Amount` wraps a `u128` in the smallest
//!    settlement unit (wei, or the token's base unit). It serializes as a
//!    decimal string so JSON consumers never round it through a float.
//!
//! 3. **Validated addresses.** `Address` accepts only `0x`-prefixed
//!    20-byte hex and stores it lowercase.
//!
//! 4. **UTC-only timestamps and an injectable clock.** Time enters the
//!    system through the `Clock` trait so that timeout behavior is
//!    deterministic under test.
//!
//! 5. **Bounded ID allocation.** Short numeric IDs are drawn from a bounded
//!    number of attempts per ID space, widening the space on repeated
//!    collision. There is no unbounded retry.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `ethlend-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod address;
pub mod amount;
pub mod clock;
pub mod error;
pub mod id_alloc;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use address::Address;
pub use amount::{Amount, WEI_PER_ETHER};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CoreError;
pub use id_alloc::ShortIdAllocator;
pub use identity::{DepositId, RequestId, TransferHandle, UserId};
pub use temporal::Timestamp;

//! # ethlend-state: Lending Request Lifecycle
//!
//! The state machine that drives one collateralised loan listing from
//! creation to a terminal outcome, together with the two components it
//! owns.
//!
//! ## Components
//!
//! - **Lifecycle** (`lifecycle.rs`): the seven states and their stable
//!   numeric codes (0–6).
//!
//! - **Collateral tracker** (`collateral.rs`): deduplicated, capped
//!   accumulation of collateral-token deposits.
//!
//! - **Timeout clock** (`timeout.rs`): the payback window, evaluated lazily
//!   against a supplied time. Nothing fires on its own.
//!
//! - **Request** (`request.rs`): the aggregate and its event table.
//!
//! - **Intents** (`intent.rs`): side effects a transition asks the caller to
//!   execute. The machine never talks to a gateway or ledger directly.
//!
//! ## Design
//!
//! The state is a runtime enum rather than a typestate because requests are
//! loaded from storage and driven by events whose kind is only known at
//! runtime. Validity is enforced by a single exhaustive match in
//! [`LendingRequest::apply`], and every rejection names the state, the
//! event and the reason.
//!
//! This crate is synchronous and does no I/O. Serialisation of concurrent
//! events on one request is the caller's job (see `ethlend-service`).

pub mod collateral;
pub mod error;
pub mod event;
pub mod intent;
pub mod lifecycle;
pub mod policy;
pub mod request;
pub mod terms;
pub mod timeout;
pub mod view;

// ─── Lifecycle re-exports ───────────────────────────────────────────

pub use lifecycle::{LendingState, UnknownStateCode};
pub use request::{LendingRequest, Transition, TransitionRecord};

// ─── Component re-exports ───────────────────────────────────────────

pub use collateral::{CollateralDeposit, CollateralError, CollateralTracker, DepositReceipt};
pub use timeout::{TimeoutClock, TimeoutError};

// ─── Event and intent re-exports ────────────────────────────────────

pub use event::{Actor, LendingEvent};
pub use intent::{
    AssetKind, BalanceDirection, BalanceIntent, Intent, TrackedTransfer, TransferIntent,
    TransferPurpose, TransferStatus,
};

// ─── Terms, policy and view re-exports ──────────────────────────────

pub use error::StateError;
pub use policy::{DefaultPolicy, LifecyclePolicy, TransitionContext, UnknownDefaultPolicy, SECONDS_PER_DAY};
pub use terms::{CollateralToken, LoanTerms, TermsError};
pub use view::{PaymentInstruction, RequestView};

//! # ethlend-service: Lending Request Service
//!
//! Wraps the pure state machine from `ethlend-state` with everything needed
//! to run it: configuration, a snapshot repository, per-request locking and
//! intent dispatch to the settlement collaborators.
//!
//! ## Concurrency
//!
//! Events on one request are serialised by a per-request mutex held for the
//! whole load, apply, save and dispatch sequence. Two racing events (a
//! cancel and a lender commit, say) therefore see each other's effects: the
//! second is evaluated against the state the first left behind. The
//! repository's version check catches writers outside this process.
//!
//! Timeouts are lazy. Nothing fires when a payback window ends; the next
//! event evaluated against the clock sees it.

pub mod config;
pub mod error;
pub mod locks;
pub mod repository;
pub mod service;

pub use config::{ConfigError, ServiceConfig, DEFAULT_LISTING_FEE_CREDITS};
pub use error::ServiceError;
pub use locks::RequestLocks;
pub use repository::{InMemoryRepository, RepositoryError, RequestRepository, Versioned};
pub use service::{DispatchStatus, DispatchedIntent, EventOutcome, LendingService};

//! # Lending Service
//!
//! Drives lending requests on behalf of callers: allocates IDs, applies
//! events under a per-request lock, persists the result and executes the
//! intents each transition returns.
//!
//! ## Event Processing
//!
//! 1. Lock the request.
//! 2. Load and validate the snapshot.
//! 3. Apply the event at the current clock time. A rejection returns here
//!    and nothing is written.
//! 4. Save the new state.
//! 5. Dispatch intents: transfers to the gateway, balance changes to the
//!    ledger. Zero-amount transfers are skipped. A refused submission is
//!    recorded on the request as rejected and can be retried later; it does
//!    not undo the transition.
//! 6. Save again with the tracked transfer handles. A failure here is
//!    logged, not returned: the transition stands and the intents have
//!    already been executed.
//!
//! Settlement outcomes arrive through [`LendingService::transfer_confirmed`]
//! and [`LendingService::transfer_failed`], which route the handle back to
//! its request and apply the matching event.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use ethlend_core::{
    Address, Amount, Clock, DepositId, RequestId, ShortIdAllocator, Timestamp, TransferHandle,
    UserId,
};
use ethlend_settlement::{BalanceLedger, SettlementGateway};
use ethlend_state::{
    Actor, BalanceDirection, BalanceIntent, Intent, LendingEvent, LendingRequest,
    LifecyclePolicy, LoanTerms, RequestView, TransferStatus, Transition, TransitionContext,
};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::locks::RequestLocks;
use crate::repository::{RequestRepository, Versioned};

// ── Outcomes ─────────────────────────────────────────────────────────

/// What happened to one intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Accepted by the gateway; outcome pending.
    Submitted { handle: TransferHandle },
    /// Zero-amount transfer; nothing to move.
    Skipped,
    /// Refused by the gateway; recorded under a local handle for retry.
    Rejected {
        handle: TransferHandle,
        reason: String,
    },
    /// Applied by the balance ledger.
    Applied { balance: u64 },
    /// Refused by the balance ledger.
    Refused { reason: String },
}

/// An intent and its dispatch result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchedIntent {
    pub intent: Intent,
    pub status: DispatchStatus,
}

/// Result of one successfully applied event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventOutcome {
    pub transition: Transition,
    pub dispatched: Vec<DispatchedIntent>,
}

impl EventOutcome {
    /// Handles of transfers the gateway accepted.
    pub fn submitted_handles(&self) -> Vec<TransferHandle> {
        self.dispatched
            .iter()
            .filter_map(|d| match d.status {
                DispatchStatus::Submitted { handle } => Some(handle),
                _ => None,
            })
            .collect()
    }
}

// ── Service ──────────────────────────────────────────────────────────

/// Lending request orchestration over injected collaborators.
pub struct LendingService {
    config: ServiceConfig,
    repository: Arc<dyn RequestRepository>,
    gateway: Arc<dyn SettlementGateway>,
    ledger: Arc<dyn BalanceLedger>,
    clock: Arc<dyn Clock>,
    allocator: ShortIdAllocator,
    rng: Mutex<StdRng>,
    locks: RequestLocks,
}

impl std::fmt::Debug for LendingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LendingService")
            .field("config", &self.config)
            .field("gateway", &self.gateway.gateway_name())
            .field("allocator", &self.allocator)
            .field("locked_requests", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl LendingService {
    pub fn new(
        config: ServiceConfig,
        repository: Arc<dyn RequestRepository>,
        gateway: Arc<dyn SettlementGateway>,
        ledger: Arc<dyn BalanceLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            repository,
            gateway,
            ledger,
            clock,
            allocator: ShortIdAllocator::default(),
            rng: Mutex::new(StdRng::from_entropy()),
            locks: RequestLocks::new(),
        }
    }

    /// Replace the ID allocator.
    pub fn with_allocator(mut self, allocator: ShortIdAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    /// Make ID allocation reproducible.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Guard configuration in effect.
    pub fn policy(&self) -> LifecyclePolicy {
        self.config.lifecycle_policy()
    }

    // ── Creation ─────────────────────────────────────────────────────

    /// Open a new request for `borrower`, charging the listing fee.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Ledger`] if the borrower cannot pay the fee.
    ///   Nothing is stored.
    /// - [`ServiceError::IdSpaceExhausted`] if no free ID was found.
    pub fn create_request(&self, borrower: UserId) -> Result<RequestId, ServiceError> {
        let raw = {
            let mut rng = self.rng.lock();
            self.allocator.allocate(&mut *rng, |candidate| {
                self.repository.contains(RequestId::from_raw(candidate))
            })?
        };
        let id = RequestId::from_raw(raw);
        let now = self.clock.now();
        let (request, intents) = LendingRequest::open(
            id,
            borrower,
            self.config.settlement_address.clone(),
            self.config.listing_fee_credits,
            now,
        );

        let mut charged = Vec::new();
        for intent in &intents {
            if let Intent::Balance(fee) = intent {
                if let Err(err) = self.ledger.apply(fee) {
                    tracing::info!(request_id = %id, borrower = %borrower, error = %err, "listing fee refused");
                    self.refund_fees(&charged);
                    return Err(err.into());
                }
                charged.push(fee.clone());
            }
        }

        if let Err(err) = self.repository.insert(&request) {
            self.refund_fees(&charged);
            return Err(err.into());
        }

        tracing::info!(request_id = %id, borrower = %borrower, state = %request.state(), "lending request created");
        Ok(id)
    }

    fn refund_fees(&self, charged: &[BalanceIntent]) {
        for fee in charged {
            let refund = BalanceIntent {
                user: fee.user,
                direction: BalanceDirection::Credit,
                credits: fee.credits,
                reason: format!("refund: {}", fee.reason),
            };
            if let Err(err) = self.ledger.apply(&refund) {
                tracing::error!(user = %fee.user, credits = fee.credits, error = %err, "listing fee refund failed");
            }
        }
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Apply `event` to request `id`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`], [`ServiceError::CorruptSnapshot`], or
    /// [`ServiceError::State`] when the machine rejects the event. In every
    /// error case the stored request is unchanged and nothing was dispatched.
    pub fn submit(&self, id: RequestId, event: LendingEvent) -> Result<EventOutcome, ServiceError> {
        let lock = self.locks.handle(id);
        let _guard = lock.lock();

        let Versioned {
            value: mut request,
            version,
        } = self.repository.load(id)?;
        let now = self.clock.now();
        let ctx = TransitionContext {
            now,
            policy: self.policy(),
        };
        let event_name = event.name();

        let transition = request.apply(event, &ctx).map_err(|err| {
            tracing::debug!(request_id = %id, state = %request.state(), event = event_name, error = %err, "event rejected");
            err
        })?;
        let version = self.repository.save(&request, version)?;

        let dispatched = self.dispatch(&mut request, &transition.intents, now);
        if !dispatched.is_empty() {
            // The transition and its side effects already happened; losing
            // the handles must not hide them from the caller.
            if let Err(err) = self.repository.save(&request, version) {
                tracing::error!(request_id = %id, error = %err, "transition committed but transfer handles not saved");
            }
        }

        if transition.changed_state() {
            tracing::info!(
                request_id = %id,
                from = %transition.from,
                to = %transition.to,
                event = event_name,
                intents = transition.intents.len(),
                "transition applied"
            );
        } else {
            tracing::debug!(request_id = %id, state = %transition.to, event = event_name, "event applied");
        }
        Ok(EventOutcome {
            transition,
            dispatched,
        })
    }

    fn dispatch(
        &self,
        request: &mut LendingRequest,
        intents: &[Intent],
        now: Timestamp,
    ) -> Vec<DispatchedIntent> {
        let id = request.id();
        intents
            .iter()
            .map(|intent| {
                let status = match intent {
                    Intent::Transfer(transfer) if transfer.amount.is_zero() => {
                        tracing::debug!(request_id = %id, purpose = %transfer.purpose, "skipping zero-amount transfer");
                        DispatchStatus::Skipped
                    }
                    Intent::Transfer(transfer) => match self.gateway.submit_transfer(
                        &transfer.from,
                        &transfer.to,
                        transfer.amount,
                        &transfer.asset,
                    ) {
                        Ok(handle) => {
                            request.track_transfer(handle, transfer.clone(), TransferStatus::Pending, now);
                            tracing::info!(request_id = %id, %handle, purpose = %transfer.purpose, amount = %transfer.amount, "transfer submitted");
                            DispatchStatus::Submitted { handle }
                        }
                        Err(err) => {
                            let handle = TransferHandle::new();
                            let reason = err.to_string();
                            request.track_transfer(
                                handle,
                                transfer.clone(),
                                TransferStatus::Rejected {
                                    reason: reason.clone(),
                                },
                                now,
                            );
                            tracing::warn!(request_id = %id, %handle, purpose = %transfer.purpose, error = %err, "transfer submission refused");
                            DispatchStatus::Rejected { handle, reason }
                        }
                    },
                    Intent::Balance(change) => match self.ledger.apply(change) {
                        Ok(balance) => DispatchStatus::Applied { balance },
                        Err(err) => {
                            tracing::warn!(request_id = %id, user = %change.user, error = %err, "balance intent refused");
                            DispatchStatus::Refused {
                                reason: err.to_string(),
                            }
                        }
                    },
                };
                DispatchedIntent {
                    intent: intent.clone(),
                    status,
                }
            })
            .collect()
    }

    /// Supply terms and the borrower's payout address.
    pub fn set_terms(
        &self,
        id: RequestId,
        terms: LoanTerms,
        borrower_address: Address,
    ) -> Result<EventOutcome, ServiceError> {
        self.submit(
            id,
            LendingEvent::SetTerms {
                terms,
                borrower_address,
            },
        )
    }

    /// Record an observed collateral deposit.
    ///
    /// A replayed observation is a no-op and returns `Ok(None)`.
    pub fn observe_deposit(
        &self,
        id: RequestId,
        deposit_id: DepositId,
        amount: Amount,
        source_address: Address,
        observed_at: Timestamp,
    ) -> Result<Option<EventOutcome>, ServiceError> {
        let event = LendingEvent::DepositObserved {
            deposit_id: deposit_id.clone(),
            amount,
            source_address,
            observed_at,
        };
        match self.submit(id, event) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(ServiceError::State(err)) if err.is_duplicate_deposit() => {
                tracing::debug!(request_id = %id, %deposit_id, "duplicate deposit ignored");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Advance to WAITING_FOR_LENDER if enough collateral has arrived.
    pub fn check_collateral(&self, id: RequestId) -> Result<EventOutcome, ServiceError> {
        self.submit(id, LendingEvent::CheckCollateral)
    }

    pub fn cancel(&self, id: RequestId, actor: Actor) -> Result<EventOutcome, ServiceError> {
        self.submit(id, LendingEvent::Cancel { actor })
    }

    pub fn lender_commits(
        &self,
        id: RequestId,
        lender_id: UserId,
        lender_address: Address,
        amount: Amount,
    ) -> Result<EventOutcome, ServiceError> {
        self.submit(
            id,
            LendingEvent::LenderCommits {
                lender_id,
                lender_address,
                amount,
            },
        )
    }

    pub fn repay(&self, id: RequestId, amount: Amount) -> Result<EventOutcome, ServiceError> {
        self.submit(id, LendingEvent::Repay { amount })
    }

    pub fn request_default(&self, id: RequestId, actor: Actor) -> Result<EventOutcome, ServiceError> {
        self.submit(id, LendingEvent::RequestDefault { actor })
    }

    // ── Settlement callbacks ─────────────────────────────────────────

    /// The gateway settled `handle`.
    pub fn transfer_confirmed(&self, handle: TransferHandle) -> Result<EventOutcome, ServiceError> {
        let id = self.request_for_transfer(handle)?;
        self.submit(id, LendingEvent::SettlementConfirmed { handle })
    }

    /// The gateway failed `handle`.
    pub fn transfer_failed(
        &self,
        handle: TransferHandle,
        reason: impl Into<String>,
    ) -> Result<EventOutcome, ServiceError> {
        let id = self.request_for_transfer(handle)?;
        self.submit(
            id,
            LendingEvent::SettlementFailed {
                handle,
                reason: reason.into(),
            },
        )
    }

    /// Resubmit a transfer the gateway refused. Returns the new handle.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Gateway`] if the gateway refuses again; the transfer
    /// stays rejected under its old handle.
    pub fn retry_transfer(
        &self,
        id: RequestId,
        handle: TransferHandle,
    ) -> Result<TransferHandle, ServiceError> {
        let lock = self.locks.handle(id);
        let _guard = lock.lock();

        let Versioned {
            value: mut request,
            version,
        } = self.repository.load(id)?;
        let intent = request.rejected_transfer(handle)?.intent.clone();
        let new_handle =
            self.gateway
                .submit_transfer(&intent.from, &intent.to, intent.amount, &intent.asset)?;
        request.resubmit(handle, new_handle, self.clock.now())?;
        self.repository.save(&request, version)?;

        tracing::info!(request_id = %id, old_handle = %handle, handle = %new_handle, purpose = %intent.purpose, "transfer resubmitted");
        Ok(new_handle)
    }

    fn request_for_transfer(&self, handle: TransferHandle) -> Result<RequestId, ServiceError> {
        self.repository
            .find_by_transfer(handle)
            .ok_or(ServiceError::UnknownTransfer { handle })
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The stored request.
    pub fn request(&self, id: RequestId) -> Result<LendingRequest, ServiceError> {
        Ok(self.repository.load(id)?.value)
    }

    /// Client projection of the request at the current time.
    pub fn view(&self, id: RequestId) -> Result<RequestView, ServiceError> {
        let request = self.request(id)?;
        Ok(RequestView::project(&request, self.clock.now(), &self.policy()))
    }

    /// Total number of requests.
    pub fn count(&self) -> usize {
        self.repository.count()
    }

    /// Number of requests opened by `borrower`.
    pub fn count_for_borrower(&self, borrower: UserId) -> usize {
        self.repository.ids_for_borrower(borrower).len()
    }

    /// The `index`-th request overall, oldest first.
    pub fn request_at(&self, index: usize) -> Option<RequestId> {
        self.repository.all_ids().get(index).copied()
    }

    /// The `index`-th request opened by `borrower`, oldest first.
    pub fn request_for_borrower_at(&self, borrower: UserId, index: usize) -> Option<RequestId> {
        self.repository.ids_for_borrower(borrower).get(index).copied()
    }
}

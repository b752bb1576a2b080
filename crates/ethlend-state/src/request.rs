//! # Lending Request Aggregate
//!
//! [`LendingRequest`] is the single authoritative record of one loan
//! listing. It owns its collateral tracker, its payback timeout clock and
//! the log of settlement transfers it asked for. Every change goes through
//! [`LendingRequest::apply`].
//!
//! ## Event Table
//!
//! | State | Event | Guard | Next | Intents |
//! |---|---|---|---|---|
//! | WAITING_FOR_DATA | set_terms | terms valid | WAITING_FOR_TOKENS | |
//! | WAITING_FOR_DATA | cancel | borrower or platform | CANCELLED | |
//! | WAITING_FOR_TOKENS | deposit_observed | new deposit id | WAITING_FOR_TOKENS | refund excess |
//! | WAITING_FOR_TOKENS | check_collateral | sufficient | WAITING_FOR_LENDER | |
//! | WAITING_FOR_TOKENS | check_collateral | insufficient | WAITING_FOR_TOKENS | |
//! | WAITING_FOR_TOKENS | cancel | borrower or platform | CANCELLED | refund collateral |
//! | WAITING_FOR_LENDER | lender_commits | amount == loan | WAITING_FOR_PAYBACK | pay borrower |
//! | WAITING_FOR_LENDER | cancel | borrower or platform | CANCELLED | refund collateral |
//! | WAITING_FOR_PAYBACK | repay | amount == loan + premium | FINISHED | pay lender, release collateral |
//! | WAITING_FOR_PAYBACK | request_default | lender, per policy | DEFAULT | forfeit collateral |
//! | WAITING_FOR_PAYBACK | settlement_failed (payout) | | WAITING_FOR_LENDER | refund lender |
//!
//! Anything else fails with [`StateError::InvalidTransition`]. Settlement
//! reports are bookkeeping and are accepted in every state, because payouts
//! requested by a terminal transition confirm after it.
//!
//! ## Security Invariant
//!
//! Application is all-or-nothing: the event is applied to a copy and the
//! copy replaces `self` only on success. A rejected event leaves the
//! request byte-for-byte unchanged.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use ethlend_core::{Address, Amount, RequestId, Timestamp, TransferHandle, UserId};

use crate::collateral::CollateralTracker;
use crate::error::StateError;
use crate::event::{Actor, LendingEvent};
use crate::intent::{
    AssetKind, BalanceDirection, BalanceIntent, Intent, TrackedTransfer, TransferIntent,
    TransferPurpose, TransferStatus,
};
use crate::lifecycle::LendingState;
use crate::policy::{DefaultPolicy, LifecyclePolicy, TransitionContext};
use crate::terms::LoanTerms;
use crate::timeout::TimeoutClock;

// ── Transition Record ────────────────────────────────────────────────

/// One state change in the request's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State before the transition.
    pub from_state: LendingState,
    /// State after the transition.
    pub to_state: LendingState,
    /// Event that caused it.
    pub event: String,
    /// When it happened.
    pub timestamp: Timestamp,
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// The request the event was applied to.
    pub request_id: RequestId,
    /// State before the event.
    pub from: LendingState,
    /// State after the event.
    pub to: LendingState,
    /// The applied event.
    pub event: &'static str,
    /// Side effects to execute.
    pub intents: Vec<Intent>,
}

impl Transition {
    /// Whether the event moved the request to a different state.
    pub fn changed_state(&self) -> bool {
        self.from != self.to
    }
}

// ── The Aggregate ────────────────────────────────────────────────────

/// A lending request and everything needed to drive it to a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingRequest {
    id: RequestId,
    borrower_id: UserId,
    lender_id: Option<UserId>,
    terms: Option<LoanTerms>,
    borrower_address: Option<Address>,
    lender_address: Option<Address>,
    settlement_address: Address,
    state: LendingState,
    created_at: Timestamp,
    state_entered_at: Timestamp,
    collateral: CollateralTracker,
    payback_window: TimeoutClock,
    transfers: Vec<TrackedTransfer>,
    transition_log: Vec<TransitionRecord>,
}

impl LendingRequest {
    /// Open a new request in WAITING_FOR_DATA.
    ///
    /// Returns the request and, when `listing_fee_credits` is non-zero, the
    /// intent debiting the listing fee from the borrower's balance.
    pub fn open(
        id: RequestId,
        borrower_id: UserId,
        settlement_address: Address,
        listing_fee_credits: u64,
        now: Timestamp,
    ) -> (Self, Vec<Intent>) {
        let request = Self {
            id,
            borrower_id,
            lender_id: None,
            terms: None,
            borrower_address: None,
            lender_address: None,
            settlement_address,
            state: LendingState::WaitingForData,
            created_at: now,
            state_entered_at: now,
            collateral: CollateralTracker::default(),
            payback_window: TimeoutClock::default(),
            transfers: Vec::new(),
            transition_log: Vec::new(),
        };
        let mut intents = Vec::new();
        if listing_fee_credits > 0 {
            intents.push(Intent::Balance(BalanceIntent {
                user: borrower_id,
                direction: BalanceDirection::Debit,
                credits: listing_fee_credits,
                reason: format!("listing fee for {id}"),
            }));
        }
        (request, intents)
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Request identifier.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The borrower who opened the request.
    pub fn borrower_id(&self) -> UserId {
        self.borrower_id
    }

    /// The committed lender, once matched.
    pub fn lender_id(&self) -> Option<UserId> {
        self.lender_id
    }

    /// Loan terms, once set.
    pub fn terms(&self) -> Option<&LoanTerms> {
        self.terms.as_ref()
    }

    /// Borrower payout address, once set.
    pub fn borrower_address(&self) -> Option<&Address> {
        self.borrower_address.as_ref()
    }

    /// Lender payout address, once matched.
    pub fn lender_address(&self) -> Option<&Address> {
        self.lender_address.as_ref()
    }

    /// Escrow account that holds collateral and loan funds.
    pub fn settlement_address(&self) -> &Address {
        &self.settlement_address
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LendingState {
        self.state
    }

    /// When the request was opened.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// When the current state was entered.
    pub fn state_entered_at(&self) -> Timestamp {
        self.state_entered_at
    }

    /// Collateral deposits.
    pub fn collateral(&self) -> &CollateralTracker {
        &self.collateral
    }

    /// Payback window.
    pub fn payback_window(&self) -> &TimeoutClock {
        &self.payback_window
    }

    /// Transfers submitted on behalf of this request.
    pub fn transfers(&self) -> &[TrackedTransfer] {
        &self.transfers
    }

    /// Look up a tracked transfer by handle.
    pub fn transfer(&self, handle: TransferHandle) -> Option<&TrackedTransfer> {
        self.transfers.iter().find(|t| t.handle == handle)
    }

    /// State change history.
    pub fn transition_log(&self) -> &[TransitionRecord] {
        &self.transition_log
    }

    // ── Derived values ───────────────────────────────────────────────

    /// Length of the payback window under `policy`, once terms are set.
    pub fn payback_duration(&self, policy: &LifecyclePolicy) -> Option<Duration> {
        self.terms
            .as_ref()
            .map(|t| policy.payback_window(t.days_to_lend))
    }

    /// Time left to repay, while waiting for payback.
    pub fn payback_remaining(&self, now: Timestamp, policy: &LifecyclePolicy) -> Option<Duration> {
        if self.state != LendingState::WaitingForPayback {
            return None;
        }
        let duration = self.payback_duration(policy)?;
        Some(self.payback_window.remaining(now, duration))
    }

    /// Whole payback days left (rounded up), while waiting for payback.
    pub fn days_left(&self, now: Timestamp, policy: &LifecyclePolicy) -> Option<u32> {
        let remaining = self.payback_remaining(now, policy)?.num_seconds();
        let day = policy.day_length_secs.clamp(1, crate::policy::SECONDS_PER_DAY) as i64;
        let days = (remaining + day - 1) / day;
        Some(u32::try_from(days).unwrap_or(u32::MAX))
    }

    /// Whether the payback window has run out without repayment.
    pub fn is_overdue(&self, now: Timestamp, policy: &LifecyclePolicy) -> bool {
        self.payback_remaining(now, policy)
            .is_some_and(|left| left == Duration::zero())
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Apply an event.
    ///
    /// On success the request reflects the new state and the returned
    /// [`Transition`] lists the intents to execute. On failure the request
    /// is unchanged.
    ///
    /// # Errors
    ///
    /// - [`StateError::InvalidTransition`] if the event is not accepted in
    ///   the current state or its guard fails.
    /// - [`StateError::TermsValidation`] for malformed terms.
    /// - [`StateError::Collateral`] for a replayed deposit.
    /// - [`StateError::UnknownTransfer`] / [`StateError::ConflictingSettlement`]
    ///   for settlement reports that do not match the tracked transfers.
    pub fn apply(
        &mut self,
        event: LendingEvent,
        ctx: &TransitionContext,
    ) -> Result<Transition, StateError> {
        let mut next = self.clone();
        let transition = next.step(event, ctx)?;
        *self = next;
        Ok(transition)
    }

    fn step(
        &mut self,
        event: LendingEvent,
        ctx: &TransitionContext,
    ) -> Result<Transition, StateError> {
        use LendingEvent as E;
        use LendingState as S;

        let from = self.state;
        let name = event.name();
        let now = ctx.now;

        let intents = match (from, event) {
            (S::WaitingForData, E::SetTerms { terms, borrower_address }) => {
                terms.validate()?;
                self.collateral = CollateralTracker::new(terms.collateral_token_amount);
                self.terms = Some(terms);
                self.borrower_address = Some(borrower_address);
                self.enter(S::WaitingForTokens, name, now);
                Vec::new()
            }

            (S::WaitingForData, E::Cancel { actor }) => {
                self.require_borrower_or_platform(actor, name)?;
                self.enter(S::Cancelled, name, now);
                Vec::new()
            }

            // Once collateral is complete the tracker has no room left, so a
            // late deposit comes back whole as excess.
            (
                S::WaitingForTokens | S::WaitingForLender | S::WaitingForPayback,
                E::DepositObserved {
                    deposit_id,
                    amount,
                    source_address,
                    observed_at,
                },
            ) => {
                let receipt = self.collateral.record_deposit(
                    deposit_id,
                    amount,
                    source_address.clone(),
                    observed_at,
                )?;
                if receipt.excess.is_zero() {
                    Vec::new()
                } else {
                    vec![self.token_transfer(
                        TransferPurpose::RefundExcessCollateral,
                        source_address,
                        receipt.excess,
                    )?]
                }
            }

            (S::WaitingForTokens, E::CheckCollateral) => {
                let required = self.require_terms()?.collateral_token_amount;
                if self.collateral.is_sufficient(required) {
                    self.enter(S::WaitingForLender, name, now);
                }
                Vec::new()
            }

            (S::WaitingForTokens | S::WaitingForLender, E::Cancel { actor }) => {
                self.require_borrower_or_platform(actor, name)?;
                let borrower = self.require_borrower_address()?.clone();
                let refund = self.token_transfer(
                    TransferPurpose::RefundCollateral,
                    borrower,
                    self.collateral.total_deposited(),
                )?;
                self.enter(S::Cancelled, name, now);
                vec![refund]
            }

            (
                S::WaitingForLender,
                E::LenderCommits {
                    lender_id,
                    lender_address,
                    amount,
                },
            ) => {
                let loan = self.require_terms()?.loan_amount;
                if amount != loan {
                    return Err(self.reject(
                        name,
                        format!("lender sent {amount}, loan amount is {loan}"),
                    ));
                }
                let borrower = self.require_borrower_address()?.clone();
                self.payback_window.start(now)?;
                self.lender_id = Some(lender_id);
                self.lender_address = Some(lender_address);
                self.enter(S::WaitingForPayback, name, now);
                vec![self.native_transfer(TransferPurpose::PayBorrower, borrower, loan)]
            }

            (S::WaitingForPayback, E::Repay { amount }) => {
                let expected = self.require_terms()?.repayment_amount()?;
                if amount != expected {
                    return Err(self.reject(
                        name,
                        format!("repayment of {amount} does not equal principal plus premium {expected}"),
                    ));
                }
                let lender = self.require_lender_address()?.clone();
                let borrower = self.require_borrower_address()?.clone();
                let pay_lender = self.native_transfer(TransferPurpose::PayLender, lender, expected);
                let release = self.token_transfer(
                    TransferPurpose::ReleaseCollateral,
                    borrower,
                    self.collateral.total_deposited(),
                )?;
                self.enter(S::Finished, name, now);
                vec![pay_lender, release]
            }

            (S::WaitingForPayback, E::RequestDefault { actor }) => {
                let lender_id = self.lender_id.ok_or_else(|| self.corrupt("lender missing"))?;
                if actor != Actor::User(lender_id) {
                    return Err(self.reject(name, format!("{actor} is not the lender")));
                }
                if let Some(payout) = self.refused_payout() {
                    return Err(self.reject(
                        name,
                        format!("loan payout {} was refused by the gateway", payout.handle),
                    ));
                }
                if ctx.policy.default_policy == DefaultPolicy::RequireExpiry {
                    let duration = self
                        .payback_duration(&ctx.policy)
                        .ok_or_else(|| self.corrupt("terms missing"))?;
                    if !self.payback_window.has_expired(now, duration) {
                        let left = self.payback_window.remaining(now, duration);
                        return Err(self.reject(
                            name,
                            format!("payback window still open for {}s", left.num_seconds()),
                        ));
                    }
                }
                let lender = self.require_lender_address()?.clone();
                let forfeit = self.token_transfer(
                    TransferPurpose::ForfeitCollateral,
                    lender,
                    self.collateral.total_deposited(),
                )?;
                self.enter(S::Default, name, now);
                vec![forfeit]
            }

            (_, E::SettlementConfirmed { handle }) => {
                self.settle(handle, TransferStatus::Confirmed, now)?;
                Vec::new()
            }

            (_, E::SettlementFailed { handle, reason }) => {
                let newly_failed = self.settle(handle, TransferStatus::Failed { reason }, now)?;
                if newly_failed == Some(TransferPurpose::PayBorrower)
                    && self.state == S::WaitingForPayback
                {
                    self.return_to_lender_market(name, now)?
                } else {
                    Vec::new()
                }
            }

            (state, event) => {
                let reason = if state.is_terminal() {
                    "request is in a terminal state"
                } else {
                    "event not accepted in this state"
                };
                return Err(StateError::InvalidTransition {
                    state,
                    event: event.name(),
                    reason: reason.to_string(),
                });
            }
        };

        Ok(Transition {
            request_id: self.id,
            from,
            to: self.state,
            event: name,
            intents,
        })
    }

    /// Record a transfer submitted for one of this request's intents.
    pub fn track_transfer(
        &mut self,
        handle: TransferHandle,
        intent: TransferIntent,
        status: TransferStatus,
        now: Timestamp,
    ) {
        let settled_at = status.is_settled().then_some(now);
        self.transfers.push(TrackedTransfer {
            handle,
            intent,
            status,
            submitted_at: now,
            settled_at,
        });
    }

    /// A transfer the gateway refused at submission.
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownTransfer`] if the handle is not tracked,
    /// [`StateError::TransferNotRetryable`] if it was not rejected.
    pub fn rejected_transfer(&self, handle: TransferHandle) -> Result<&TrackedTransfer, StateError> {
        let tracked = self
            .transfer(handle)
            .ok_or(StateError::UnknownTransfer { handle })?;
        match tracked.status {
            TransferStatus::Rejected { .. } => Ok(tracked),
            ref status => Err(StateError::TransferNotRetryable {
                handle,
                status: format!("{status:?}"),
            }),
        }
    }

    /// Replace a rejected transfer with its resubmission under `new_handle`.
    pub fn resubmit(
        &mut self,
        old_handle: TransferHandle,
        new_handle: TransferHandle,
        now: Timestamp,
    ) -> Result<(), StateError> {
        self.rejected_transfer(old_handle)?;
        if let Some(tracked) = self.transfers.iter_mut().find(|t| t.handle == old_handle) {
            tracked.handle = new_handle;
            tracked.status = TransferStatus::Pending;
            tracked.submitted_at = now;
            tracked.settled_at = None;
        }
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    fn enter(&mut self, to: LendingState, event: &str, at: Timestamp) {
        self.transition_log.push(TransitionRecord {
            from_state: self.state,
            to_state: to,
            event: event.to_string(),
            timestamp: at,
        });
        self.state = to;
        self.state_entered_at = at;
    }

    /// Undo a failed payout: the lender's funds are still in escrow.
    fn return_to_lender_market(
        &mut self,
        event: &'static str,
        now: Timestamp,
    ) -> Result<Vec<Intent>, StateError> {
        let loan = self.require_terms()?.loan_amount;
        let lender = self
            .lender_address
            .take()
            .ok_or_else(|| self.corrupt("lender address missing"))?;
        self.lender_id = None;
        self.payback_window.reset();
        self.enter(LendingState::WaitingForLender, event, now);
        Ok(vec![self.native_transfer(TransferPurpose::RefundLender, lender, loan)])
    }

    /// Record a settlement outcome. Returns the purpose when the outcome is
    /// new, `None` when it repeats the recorded one.
    ///
    /// A transfer the gateway refused at submission may still be reported
    /// as failed; that is how an unretried refusal gets compensated.
    fn settle(
        &mut self,
        handle: TransferHandle,
        outcome: TransferStatus,
        now: Timestamp,
    ) -> Result<Option<TransferPurpose>, StateError> {
        let tracked = self
            .transfers
            .iter_mut()
            .find(|t| t.handle == handle)
            .ok_or(StateError::UnknownTransfer { handle })?;
        let repeated = match (&tracked.status, &outcome) {
            (TransferStatus::Pending, _)
            | (TransferStatus::Rejected { .. }, TransferStatus::Failed { .. }) => false,
            (TransferStatus::Confirmed, TransferStatus::Confirmed)
            | (TransferStatus::Failed { .. }, TransferStatus::Failed { .. }) => true,
            (recorded, _) => {
                return Err(StateError::ConflictingSettlement {
                    handle,
                    recorded: format!("{recorded:?}"),
                })
            }
        };
        if repeated {
            return Ok(None);
        }
        tracked.status = outcome;
        tracked.settled_at = Some(now);
        Ok(Some(tracked.intent.purpose))
    }

    /// The current loan payout, if the gateway refused it and nobody has
    /// retried or failed it since.
    fn refused_payout(&self) -> Option<&TrackedTransfer> {
        self.transfers.iter().find(|t| {
            t.intent.purpose == TransferPurpose::PayBorrower
                && matches!(t.status, TransferStatus::Rejected { .. })
        })
    }

    fn native_transfer(&self, purpose: TransferPurpose, to: Address, amount: Amount) -> Intent {
        Intent::Transfer(TransferIntent {
            purpose,
            from: self.settlement_address.clone(),
            to,
            amount,
            asset: AssetKind::Native,
        })
    }

    fn token_transfer(
        &self,
        purpose: TransferPurpose,
        to: Address,
        amount: Amount,
    ) -> Result<Intent, StateError> {
        let token = self.require_terms()?.collateral_token.clone();
        Ok(Intent::Transfer(TransferIntent {
            purpose,
            from: self.settlement_address.clone(),
            to,
            amount,
            asset: AssetKind::Token(token),
        }))
    }

    fn require_borrower_or_platform(&self, actor: Actor, event: &'static str) -> Result<(), StateError> {
        match actor {
            Actor::Platform => Ok(()),
            Actor::User(id) if id == self.borrower_id => Ok(()),
            Actor::User(_) => Err(self.reject(event, format!("{actor} is neither the borrower nor the platform"))),
        }
    }

    fn require_terms(&self) -> Result<&LoanTerms, StateError> {
        self.terms.as_ref().ok_or_else(|| self.corrupt("terms missing"))
    }

    fn require_borrower_address(&self) -> Result<&Address, StateError> {
        self.borrower_address
            .as_ref()
            .ok_or_else(|| self.corrupt("borrower address missing"))
    }

    fn require_lender_address(&self) -> Result<&Address, StateError> {
        self.lender_address
            .as_ref()
            .ok_or_else(|| self.corrupt("lender address missing"))
    }

    fn reject(&self, event: &'static str, reason: String) -> StateError {
        StateError::InvalidTransition {
            state: self.state,
            event,
            reason,
        }
    }

    fn corrupt(&self, what: &str) -> StateError {
        StateError::CorruptSnapshot {
            request_id: self.id,
            reason: format!("{what} in state {}", self.state),
        }
    }

    // ── Snapshot validation ──────────────────────────────────────────

    /// Check the structural invariants of a loaded snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::CorruptSnapshot`] naming the first violated
    /// invariant.
    pub fn validate(&self) -> Result<(), StateError> {
        use LendingState as S;

        let terms_required = !matches!(self.state, S::WaitingForData | S::Cancelled);
        let lender_required = matches!(self.state, S::WaitingForPayback | S::Default | S::Finished);

        if self.state == S::WaitingForData && self.terms.is_some() {
            return Err(self.corrupt("terms present"));
        }
        if terms_required && self.terms.is_none() {
            return Err(self.corrupt("terms missing"));
        }
        if self.terms.is_some() != self.borrower_address.is_some() {
            return Err(self.corrupt("terms and borrower address disagree"));
        }
        if self.lender_id.is_some() != self.lender_address.is_some() {
            return Err(self.corrupt("lender id and lender address disagree"));
        }
        if lender_required != self.lender_id.is_some() {
            return Err(self.corrupt(if lender_required {
                "lender missing"
            } else {
                "lender present"
            }));
        }
        if lender_required != self.payback_window.is_started() {
            return Err(self.corrupt(if lender_required {
                "payback window not started"
            } else {
                "payback window running"
            }));
        }
        if let Some(terms) = &self.terms {
            if terms.validate().is_err() {
                return Err(self.corrupt("terms invalid"));
            }
            if self.collateral.cap() != terms.collateral_token_amount {
                return Err(self.corrupt("collateral cap differs from terms"));
            }
        }
        if self.collateral.total_deposited() > self.collateral.cap() {
            return Err(self.corrupt("credited collateral exceeds cap"));
        }
        if let Some(last) = self.transition_log.last() {
            if last.to_state != self.state {
                return Err(self.corrupt("transition log does not end in current state"));
            }
        }
        Ok(())
    }
}

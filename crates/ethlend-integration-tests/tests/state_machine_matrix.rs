//! # Lifecycle State Machine Properties
//!
//! The transition matrix as a table test, then random event sequences
//! applied directly to a [`LendingRequest`] checking the invariants that
//! must hold after every step.

mod common;

use chrono::Duration;
use proptest::prelude::*;

use common::*;
use ethlend_core::{Amount, DepositId, RequestId, Timestamp, TransferHandle, UserId};
use ethlend_state::{
    Actor, DefaultPolicy, Intent, LendingEvent, LendingRequest, LendingState, LifecyclePolicy,
    TransferStatus, TransitionContext,
};

// ── Matrix ───────────────────────────────────────────────────────────

#[test]
fn codes_are_stable() {
    let expected = [
        (0, "WAITING_FOR_DATA"),
        (1, "WAITING_FOR_TOKENS"),
        (2, "CANCELLED"),
        (3, "WAITING_FOR_LENDER"),
        (4, "WAITING_FOR_PAYBACK"),
        (5, "DEFAULT"),
        (6, "FINISHED"),
    ];
    for (code, name) in expected {
        let state = LendingState::from_code(code).unwrap();
        assert_eq!(state.code(), code);
        assert_eq!(state.as_str(), name);
    }
    assert!(LendingState::from_code(7).is_none());
    assert!(LendingState::try_from(200u8).is_err());
}

#[test]
fn transition_matrix() {
    use LendingState::*;
    let allowed: &[(LendingState, LendingState)] = &[
        (WaitingForData, WaitingForTokens),
        (WaitingForData, Cancelled),
        (WaitingForTokens, WaitingForLender),
        (WaitingForTokens, Cancelled),
        (WaitingForLender, WaitingForPayback),
        (WaitingForLender, Cancelled),
        (WaitingForPayback, Finished),
        (WaitingForPayback, Default),
        (WaitingForPayback, WaitingForLender),
    ];
    for from in LendingState::ALL {
        for to in LendingState::ALL {
            let expected = allowed.contains(&(from, to));
            assert_eq!(
                from.valid_transitions().contains(&to),
                expected,
                "{from} -> {to}"
            );
        }
    }
}

#[test]
fn terminal_and_cancellable_sets() {
    let terminal: Vec<u8> = LendingState::ALL
        .iter()
        .filter(|s| s.is_terminal())
        .map(|s| s.code())
        .collect();
    assert_eq!(terminal, vec![2, 5, 6]);
    let cancellable: Vec<u8> = LendingState::ALL
        .iter()
        .filter(|s| s.is_cancellable())
        .map(|s| s.code())
        .collect();
    assert_eq!(cancellable, vec![0, 1, 3]);
}

// ── Random event sequences ───────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    SetTerms,
    Deposit { tag: u8, amount: u16 },
    CheckCollateral,
    CancelByBorrower,
    CancelByStranger,
    Commit { exact: bool },
    Repay { exact: bool },
    Default { by_lender: bool },
    Confirm(usize),
    Fail(usize),
    Advance { hours: u16 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::SetTerms),
        (0u8..6, 0u16..16).prop_map(|(tag, amount)| Op::Deposit { tag, amount }),
        Just(Op::CheckCollateral),
        Just(Op::CancelByBorrower),
        Just(Op::CancelByStranger),
        any::<bool>().prop_map(|exact| Op::Commit { exact }),
        any::<bool>().prop_map(|exact| Op::Repay { exact }),
        any::<bool>().prop_map(|by_lender| Op::Default { by_lender }),
        (0usize..8).prop_map(Op::Confirm),
        (0usize..8).prop_map(Op::Fail),
        (0u16..400).prop_map(|hours| Op::Advance { hours }),
    ]
}

fn policy() -> impl Strategy<Value = DefaultPolicy> {
    prop_oneof![
        Just(DefaultPolicy::RequireExpiry),
        Just(DefaultPolicy::LenderDiscretion)
    ]
}

struct Harness {
    request: LendingRequest,
    now: Timestamp,
    policy: LifecyclePolicy,
}

impl Harness {
    fn new(default_policy: DefaultPolicy) -> Self {
        let (request, _) =
            LendingRequest::open(RequestId::from_raw(42), UserId::from_raw(BORROWER), escrow(), 1, t0());
        Self {
            request,
            now: t0(),
            policy: LifecyclePolicy {
                default_policy,
                ..LifecyclePolicy::default()
            },
        }
    }

    fn handle_at(&self, index: usize) -> TransferHandle {
        let transfers = self.request.transfers();
        if transfers.is_empty() {
            TransferHandle::new()
        } else {
            transfers[index % transfers.len()].handle
        }
    }

    fn event(&self, op: &Op) -> Option<LendingEvent> {
        let lender = UserId::from_raw(LENDER);
        Some(match op {
            Op::SetTerms => LendingEvent::SetTerms {
                terms: standard_terms(),
                borrower_address: borrower_address(),
            },
            Op::Deposit { tag, amount } => LendingEvent::DepositObserved {
                deposit_id: DepositId::new(format!("tx{tag}:0")),
                amount: Amount::new(u128::from(*amount)),
                source_address: borrower_address(),
                observed_at: self.now,
            },
            Op::CheckCollateral => LendingEvent::CheckCollateral,
            Op::CancelByBorrower => LendingEvent::Cancel {
                actor: Actor::User(UserId::from_raw(BORROWER)),
            },
            Op::CancelByStranger => LendingEvent::Cancel {
                actor: Actor::User(UserId::from_raw(999)),
            },
            Op::Commit { exact } => LendingEvent::LenderCommits {
                lender_id: lender,
                lender_address: lender_address(),
                amount: if *exact { Amount::ether(1) } else { Amount::new(5) },
            },
            Op::Repay { exact } => LendingEvent::Repay {
                amount: if *exact { repayment() } else { Amount::ether(1) },
            },
            Op::Default { by_lender } => LendingEvent::RequestDefault {
                actor: if *by_lender {
                    Actor::User(lender)
                } else {
                    Actor::Platform
                },
            },
            Op::Confirm(i) => LendingEvent::SettlementConfirmed {
                handle: self.handle_at(*i),
            },
            Op::Fail(i) => LendingEvent::SettlementFailed {
                handle: self.handle_at(*i),
                reason: "dropped".into(),
            },
            Op::Advance { .. } => return None,
        })
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every accepted event moves along an edge of the matrix, rejected
    /// events leave the request untouched, and terminal states absorb.
    #[test]
    fn random_sequences_respect_invariants(
        default_policy in policy(),
        ops in prop::collection::vec(op(), 1..40),
    ) {
        let mut h = Harness::new(default_policy);
        let mut reached_terminal: Option<LendingState> = None;

        for op in &ops {
            if let Op::Advance { hours } = op {
                h.now = h.now.checked_add(Duration::hours(i64::from(*hours))).unwrap();
                continue;
            }
            let Some(event) = h.event(op) else { continue };
            let before = h.request.clone();
            let ctx = TransitionContext { now: h.now, policy: h.policy };

            match h.request.apply(event, &ctx) {
                Ok(transition) => {
                    prop_assert_eq!(transition.from, before.state());
                    prop_assert_eq!(transition.to, h.request.state());
                    if transition.changed_state() {
                        prop_assert!(
                            transition.from.valid_transitions().contains(&transition.to),
                            "{} -> {} is not an edge", transition.from, transition.to
                        );
                    }
                    for intent in &transition.intents {
                        if let Intent::Transfer(t) = intent {
                            h.request.track_transfer(
                                TransferHandle::new(),
                                t.clone(),
                                TransferStatus::Pending,
                                h.now,
                            );
                        }
                    }
                }
                Err(_) => prop_assert_eq!(&h.request, &before),
            }

            let state = h.request.state();
            prop_assert_eq!(LendingState::from_code(state.code()), Some(state));
            if let Some(terminal) = reached_terminal {
                prop_assert_eq!(state, terminal, "left terminal state");
            } else if state.is_terminal() {
                reached_terminal = Some(state);
            }

            let cap = h
                .request
                .terms()
                .map(|t| t.collateral_token_amount)
                .unwrap_or(Amount::new(0));
            prop_assert!(h.request.collateral().total_deposited() <= cap);
            prop_assert!(h.request.validate().is_ok());
        }
    }

    /// The remaining window never exceeds the configured length and never
    /// goes negative, however far the clock runs.
    #[test]
    fn payback_countdown_is_bounded(elapsed_hours in 0i64..2_000) {
        let mut h = Harness::new(DefaultPolicy::RequireExpiry);
        let ctx = TransitionContext::at(t0());
        h.request.apply(LendingEvent::SetTerms {
            terms: standard_terms(),
            borrower_address: borrower_address(),
        }, &ctx).unwrap();
        h.request.apply(LendingEvent::DepositObserved {
            deposit_id: DepositId::new("full:0"),
            amount: Amount::new(10),
            source_address: borrower_address(),
            observed_at: t0(),
        }, &ctx).unwrap();
        h.request.apply(LendingEvent::CheckCollateral, &ctx).unwrap();
        h.request.apply(LendingEvent::LenderCommits {
            lender_id: UserId::from_raw(LENDER),
            lender_address: lender_address(),
            amount: Amount::ether(1),
        }, &ctx).unwrap();

        let now = t0().checked_add(Duration::hours(elapsed_hours)).unwrap();
        let days = h.request.days_left(now, &h.policy).unwrap();
        prop_assert!(days <= 10);
        let remaining = h.request.payback_remaining(now, &h.policy).unwrap();
        prop_assert!(remaining >= Duration::zero());
        prop_assert_eq!(h.request.is_overdue(now, &h.policy), elapsed_hours >= 240);
    }
}

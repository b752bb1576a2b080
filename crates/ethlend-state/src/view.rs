//! # Read Model
//!
//! [`RequestView`] is the flattened, serializable projection of a request
//! that listing pages and API clients consume. It adds the derived values a
//! client needs to act: the payback countdown and where to send what next.

use serde::Serialize;

use ethlend_core::{Address, Amount, RequestId, Timestamp, UserId};

use crate::intent::AssetKind;
use crate::lifecycle::LendingState;
use crate::policy::LifecyclePolicy;
use crate::request::LendingRequest;
use crate::terms::LoanTerms;

/// What the next actor should send to escrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentInstruction {
    /// Escrow account.
    pub address: Address,
    /// Amount still expected.
    pub amount: Amount,
    /// Asset to send.
    pub asset: AssetKind,
}

/// Client-facing snapshot of a lending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestView {
    pub id: RequestId,
    pub state_code: u8,
    pub state_name: &'static str,
    pub borrower_id: UserId,
    pub lender_id: Option<UserId>,
    pub terms: Option<LoanTerms>,
    pub borrower_address: Option<Address>,
    pub lender_address: Option<Address>,
    pub collateral_deposited: Amount,
    pub created_at: Timestamp,
    pub state_entered_at: Timestamp,
    pub payback_started_at: Option<Timestamp>,
    pub payback_deadline: Option<Timestamp>,
    /// Whole days left to repay, rounded up.
    pub days_left: Option<u32>,
    /// Whole minutes left to repay, rounded up.
    pub minutes_left: Option<i64>,
    /// Pending payment into escrow, if the request is waiting for one.
    pub send: Option<PaymentInstruction>,
}

impl RequestView {
    /// Project `request` as seen at `now`.
    pub fn project(request: &LendingRequest, now: Timestamp, policy: &LifecyclePolicy) -> Self {
        let state = request.state();
        let deadline = request
            .payback_duration(policy)
            .and_then(|d| request.payback_window().deadline(d));
        let minutes_left = request
            .payback_remaining(now, policy)
            .map(|left| (left.num_seconds() + 59) / 60);

        Self {
            id: request.id(),
            state_code: state.code(),
            state_name: state.as_str(),
            borrower_id: request.borrower_id(),
            lender_id: request.lender_id(),
            terms: request.terms().cloned(),
            borrower_address: request.borrower_address().cloned(),
            lender_address: request.lender_address().cloned(),
            collateral_deposited: request.collateral().total_deposited(),
            created_at: request.created_at(),
            state_entered_at: request.state_entered_at(),
            payback_started_at: request.payback_window().window_start(),
            payback_deadline: deadline,
            days_left: request.days_left(now, policy),
            minutes_left,
            send: payment_instruction(request),
        }
    }
}

fn payment_instruction(request: &LendingRequest) -> Option<PaymentInstruction> {
    let terms = request.terms()?;
    let (amount, asset) = match request.state() {
        LendingState::WaitingForTokens => (
            terms
                .collateral_token_amount
                .saturating_sub(request.collateral().total_deposited()),
            AssetKind::Token(terms.collateral_token.clone()),
        ),
        LendingState::WaitingForLender => (terms.loan_amount, AssetKind::Native),
        LendingState::WaitingForPayback => (terms.repayment_amount().ok()?, AssetKind::Native),
        _ => return None,
    };
    Some(PaymentInstruction {
        address: request.settlement_address().clone(),
        amount,
        asset,
    })
}

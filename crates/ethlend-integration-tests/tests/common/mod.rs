//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use ethlend_core::{Address, Amount, DepositId, ManualClock, RequestId, Timestamp, UserId};
use ethlend_service::{InMemoryRepository, LendingService, ServiceConfig};
use ethlend_settlement::{InMemoryBalanceLedger, InMemoryGateway};
use ethlend_state::{CollateralToken, LoanTerms};

pub const BORROWER: u64 = 100;
pub const LENDER: u64 = 200;

pub fn addr(c: char) -> Address {
    Address::parse(&format!("0x{}", c.to_string().repeat(40))).unwrap()
}

pub fn escrow() -> Address {
    addr('e')
}

pub fn borrower_address() -> Address {
    addr('b')
}

pub fn lender_address() -> Address {
    addr('c')
}

pub fn t0() -> Timestamp {
    Timestamp::parse("2026-03-01T12:00:00Z").unwrap()
}

/// loanAmount = 1e18, premium = 0.2e18, collateral = 10 tokens, 10 days.
pub fn standard_terms() -> LoanTerms {
    LoanTerms {
        loan_amount: Amount::ether(1),
        premium: Amount::new(200_000_000_000_000_000),
        collateral_token_amount: Amount::new(10),
        collateral_token: CollateralToken {
            name: "Augur tokens".into(),
            contract_address: addr('1'),
        },
        info_link: "https://etherscan.io/token/REP".into(),
        days_to_lend: 10,
    }
}

pub fn repayment() -> Amount {
    Amount::new(1_200_000_000_000_000_000)
}

pub struct World {
    pub service: Arc<LendingService>,
    pub repo: Arc<InMemoryRepository>,
    pub gateway: Arc<InMemoryGateway>,
    pub ledger: Arc<InMemoryBalanceLedger>,
    pub clock: Arc<ManualClock>,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::new(escrow()))
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let gateway = Arc::new(InMemoryGateway::new());
        let ledger = Arc::new(InMemoryBalanceLedger::new());
        ledger.open_account(UserId::from_raw(BORROWER), 1_000);
        let clock = Arc::new(ManualClock::new(t0()));
        let service = LendingService::new(
            config,
            repo.clone(),
            gateway.clone(),
            ledger.clone(),
            clock.clone(),
        )
        .with_rng_seed(7);
        Self {
            service: Arc::new(service),
            repo,
            gateway,
            ledger,
            clock,
        }
    }

    pub fn borrower(&self) -> UserId {
        UserId::from_raw(BORROWER)
    }

    pub fn lender(&self) -> UserId {
        UserId::from_raw(LENDER)
    }

    /// A request in WAITING_FOR_TOKENS with standard terms.
    pub fn with_terms(&self) -> RequestId {
        let id = self.service.create_request(self.borrower()).unwrap();
        self.service
            .set_terms(id, standard_terms(), borrower_address())
            .unwrap();
        id
    }

    pub fn deposit(&self, id: RequestId, tag: &str, amount: u128) {
        self.service
            .observe_deposit(
                id,
                DepositId::new(tag),
                Amount::new(amount),
                borrower_address(),
                t0(),
            )
            .unwrap();
    }

    /// A request in WAITING_FOR_LENDER.
    pub fn collateralised(&self) -> RequestId {
        let id = self.with_terms();
        self.deposit(id, "tx-full:0", 10);
        self.service.check_collateral(id).unwrap();
        id
    }

    /// A request in WAITING_FOR_PAYBACK, window started at the current clock.
    pub fn funded(&self) -> RequestId {
        let id = self.collateralised();
        self.service
            .lender_commits(id, self.lender(), lender_address(), Amount::ether(1))
            .unwrap();
        id
    }
}

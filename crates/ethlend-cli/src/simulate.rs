//! # Simulate Subcommand
//!
//! Runs one lending request through a scripted scenario using in-memory
//! collaborators and a manual clock, printing every step. Useful for
//! checking a configuration (fee, default policy, day length) before it
//! goes live.
//!
//! ## Scenarios
//!
//! - `repay`: the borrower repays one day before the window closes.
//! - `default`: the window expires and the lender claims the collateral.
//! - `cancel`: the borrower withdraws after a partial deposit.
//! - `failed-payout`: the gateway fails the loan payout and the request
//!   returns to the lender market.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use clap::{Args, ValueEnum};
use serde::Serialize;

use ethlend_core::{Address, Amount, Clock, DepositId, ManualClock, RequestId, Timestamp, UserId};
use ethlend_service::{DispatchedIntent, EventOutcome, LendingService, ServiceConfig};
use ethlend_settlement::{InMemoryBalanceLedger, InMemoryGateway};
use ethlend_state::{
    Actor, CollateralToken, DefaultPolicy, LendingState, LoanTerms, RequestView,
};

/// Simulated clock start.
const SIMULATION_START: &str = "2026-01-01T00:00:00Z";

/// Which scripted path to run.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    Repay,
    Default,
    Cancel,
    FailedPayout,
}

/// Arguments for `ethlend simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Scenario to run.
    #[arg(long, value_enum, default_value_t = Scenario::Repay)]
    pub scenario: Scenario,

    /// Loan amount in wei.
    #[arg(long, default_value = "1000000000000000000")]
    pub loan: Amount,

    /// Lender premium in wei.
    #[arg(long, default_value = "200000000000000000")]
    pub premium: Amount,

    /// Collateral token amount in base units.
    #[arg(long, default_value = "10")]
    pub collateral: Amount,

    /// Payback window in days.
    #[arg(long, default_value_t = 10)]
    pub days: u32,

    /// Override the configured default policy.
    #[arg(long)]
    pub policy: Option<DefaultPolicy>,

    /// Print the run as JSON.
    #[arg(long)]
    pub json: bool,
}

/// One applied step.
#[derive(Debug, Serialize)]
pub struct SimulationStep {
    pub action: String,
    pub at: Timestamp,
    pub state: &'static str,
    pub state_code: u8,
    pub dispatched: Vec<DispatchedIntent>,
}

/// A completed run.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub scenario: String,
    pub request_id: RequestId,
    pub steps: Vec<SimulationStep>,
    pub result: RequestView,
}

struct Simulation {
    service: LendingService,
    clock: Arc<ManualClock>,
    gateway: Arc<InMemoryGateway>,
    request_id: RequestId,
    steps: Vec<SimulationStep>,
}

const BORROWER: u64 = 1;
const LENDER: u64 = 2;

fn party_address(byte: char) -> Result<Address> {
    Ok(Address::parse(&format!("0x{}", byte.to_string().repeat(40)))?)
}

impl Simulation {
    fn start(config: ServiceConfig) -> Result<Self> {
        let clock = Arc::new(ManualClock::new(Timestamp::parse(SIMULATION_START)?));
        let gateway = Arc::new(InMemoryGateway::new());
        let ledger = Arc::new(InMemoryBalanceLedger::new());
        ledger.open_account(UserId::from_raw(BORROWER), config.listing_fee_credits);

        let service = LendingService::new(
            config,
            Arc::new(ethlend_service::InMemoryRepository::new()),
            gateway.clone(),
            ledger,
            clock.clone(),
        )
        .with_rng_seed(0);
        let request_id = service
            .create_request(UserId::from_raw(BORROWER))
            .context("failed to create request")?;

        let mut sim = Self {
            service,
            clock,
            gateway,
            request_id,
            steps: Vec::new(),
        };
        let state = sim.service.request(request_id)?.state();
        sim.steps.push(SimulationStep {
            action: "create_request".into(),
            at: sim.clock.now(),
            state: state.as_str(),
            state_code: state.code(),
            dispatched: Vec::new(),
        });
        Ok(sim)
    }

    fn record(&mut self, action: impl Into<String>, outcome: Option<EventOutcome>) {
        let action = action.into();
        let (state, dispatched) = match outcome {
            Some(outcome) => (outcome.transition.to, outcome.dispatched),
            None => (self.current_state(), Vec::new()),
        };
        tracing::info!(request_id = %self.request_id, %state, %action, "simulation step");
        self.steps.push(SimulationStep {
            action,
            at: self.clock.now(),
            state: state.as_str(),
            state_code: state.code(),
            dispatched,
        });
    }

    fn current_state(&self) -> LendingState {
        self.service
            .request(self.request_id)
            .map(|r| r.state())
            .unwrap_or(LendingState::WaitingForData)
    }

    fn deposit(&mut self, n: usize, amount: Amount) -> Result<()> {
        let outcome = self.service.observe_deposit(
            self.request_id,
            DepositId::new(format!("sim-deposit-{n}")),
            amount,
            party_address('b')?,
            self.clock.now(),
        )?;
        self.record(format!("deposit {amount}"), outcome);
        let outcome = self.service.check_collateral(self.request_id)?;
        self.record("check_collateral", Some(outcome));
        Ok(())
    }

    fn finish(self, scenario: Scenario) -> Result<SimulationReport> {
        Ok(SimulationReport {
            scenario: format!("{scenario:?}"),
            request_id: self.request_id,
            result: self.service.view(self.request_id)?,
            steps: self.steps,
        })
    }
}

/// Run `scenario` and return the report.
pub fn simulate(args: &SimulateArgs, mut config: ServiceConfig) -> Result<SimulationReport> {
    if let Some(policy) = args.policy {
        config.default_policy = policy;
    }
    let window = config.lifecycle_policy().payback_window(args.days);
    let terms = LoanTerms {
        loan_amount: args.loan,
        premium: args.premium,
        collateral_token_amount: args.collateral,
        collateral_token: CollateralToken {
            name: "Simulated collateral".into(),
            contract_address: party_address('7')?,
        },
        info_link: String::new(),
        days_to_lend: args.days,
    };
    let repayment = terms.repayment_amount()?;
    let first_deposit = if args.collateral > Amount::new(1) {
        Amount::new(1)
    } else {
        args.collateral
    };

    let mut sim = Simulation::start(config)?;
    let id = sim.request_id;

    let outcome = sim.service.set_terms(id, terms, party_address('b')?)?;
    sim.record("set_terms", Some(outcome));
    sim.deposit(1, first_deposit)?;

    if args.scenario == Scenario::Cancel {
        let outcome = sim
            .service
            .cancel(id, Actor::User(UserId::from_raw(BORROWER)))?;
        sim.record("cancel", Some(outcome));
        return sim.finish(args.scenario);
    }

    let rest = args.collateral.saturating_sub(first_deposit);
    if !rest.is_zero() {
        sim.deposit(2, rest)?;
    }

    let outcome = sim.service.lender_commits(
        id,
        UserId::from_raw(LENDER),
        party_address('c')?,
        args.loan,
    )?;
    let payout = outcome.submitted_handles();
    sim.record("lender_commits", Some(outcome));

    match args.scenario {
        Scenario::Repay => {
            sim.clock.advance(window - Duration::seconds(window.num_seconds().min(86_400)));
            let outcome = sim.service.repay(id, repayment)?;
            let handles = outcome.submitted_handles();
            sim.record("repay", Some(outcome));
            for handle in payout.into_iter().chain(handles) {
                let outcome = sim.service.transfer_confirmed(handle)?;
                sim.record(format!("confirm {handle}"), Some(outcome));
            }
        }
        Scenario::Default => {
            sim.clock.advance(window + Duration::seconds(1));
            let outcome = sim
                .service
                .request_default(id, Actor::User(UserId::from_raw(LENDER)))?;
            sim.record("request_default", Some(outcome));
        }
        Scenario::FailedPayout => {
            let Some(handle) = payout.first().copied() else {
                bail!("loan payout was not submitted");
            };
            let outcome = sim
                .service
                .transfer_failed(handle, "simulated payout failure")?;
            sim.record(format!("fail {handle}"), Some(outcome));
        }
        Scenario::Cancel => {}
    }

    tracing::debug!(submitted = sim.gateway.submitted().len(), "simulation finished");
    sim.finish(args.scenario)
}

/// Execute `ethlend simulate`.
pub fn run_simulate(args: &SimulateArgs, config: ServiceConfig) -> Result<u8> {
    let report = simulate(args, config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(0);
    }

    println!("Request {} ({})", report.request_id, report.scenario);
    for step in &report.steps {
        println!("  {}  {:<28} -> {}", step.at, step.action, step.state);
        for d in &step.dispatched {
            println!("      {}", serde_json::to_string(d)?);
        }
    }
    println!("Final state: {} ({})", report.result.state_name, report.result.state_code);
    Ok(0)
}

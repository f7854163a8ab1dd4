//! Integration tests for the zinsplan projection engine
//!
//! Tests are organized by topic:
//! - `withdrawal` - Worked withdrawal examples and ledger arithmetic
//! - `strategies` - Strategy behavior inside full runs (bucket, guardrails, RMD)
//! - `income` - Pension, other income and health insurance in the ledger
//! - `pipeline` - Savings phase feeding the withdrawal phase
//! - `comparison` - Shared-path strategy comparison
//! - `monte_carlo` - Seeded Monte Carlo summaries
//! - `returns` - Return generator determinism
//! - `validation` - Configuration normalization and validation
//! - `properties` - Property-based checks of the ledger invariants

mod comparison;
mod pipeline;
mod properties;
mod returns;
mod strategies;

use crate::config::{HorizonInput, PlanInput, StrategyInput, ValidatedPlan, WithdrawalInput};
use crate::model::ReturnProfile;

/// Withdrawal-only plan starting in 2040 with `capital` at cost
fn withdrawal_plan(
    strategy: StrategyInput,
    capital: f64,
    years: i16,
    returns: ReturnProfile,
) -> PlanInput {
    PlanInput {
        returns: Some(returns),
        withdrawal: Some(WithdrawalInput {
            start_year: Some(2040),
            horizon: Some(HorizonInput::EndYear {
                year: 2040 + years - 1,
            }),
            strategy: Some(strategy),
            initial_capital: Some(capital),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn validated(input: PlanInput) -> ValidatedPlan {
    input.normalize().validate().expect("plan should validate")
}

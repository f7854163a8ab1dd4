//! Tests for the savings phase feeding the withdrawal phase
//!
//! These tests verify that:
//! - The withdrawal phase starts with the savings portfolio plus extra capital
//! - Cost basis and taxed Vorabpauschalen carry over and shape sale taxes
//! - A seeded plan reproduces bit for bit

use jiff::civil::date;

use crate::config::{
    AccumulationInput, ElementInput, HorizonInput, PlanInput, StrategyInput, WithdrawalInput,
};
use crate::model::{ContributionKind, ReturnProfile};
use crate::progress::CancellationToken;
use crate::simulation::simulate;

use super::validated;

fn saver(returns: ReturnProfile, initial_capital: Option<f64>) -> PlanInput {
    PlanInput {
        returns: Some(returns),
        accumulation: Some(AccumulationInput {
            start_year: Some(2025),
            end_year: Some(2044),
            elements: vec![
                ElementInput {
                    name: Some("MSCI World Sparplan".to_string()),
                    kind: ContributionKind::SavingsPlan {
                        annual_amount: 6_000.0,
                        monthly: true,
                    },
                    start: date(2025, 1, 1),
                    end: None,
                    annual_cost_rate: Some(0.002),
                },
                ElementInput {
                    name: None,
                    kind: ContributionKind::LumpSum { amount: 20_000.0 },
                    start: date(2030, 7, 1),
                    end: None,
                    annual_cost_rate: None,
                },
            ],
        }),
        withdrawal: Some(WithdrawalInput {
            horizon: Some(HorizonInput::EndYear { year: 2074 }),
            strategy: Some(StrategyInput::FourPercent),
            initial_capital,
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[test]
fn test_withdrawal_starts_from_savings_portfolio() {
    let plan = validated(saver(ReturnProfile::Fixed { rate: 0.06 }, None));
    assert_eq!(plan.withdrawal.start_year, 2045);

    let result = simulate(&plan, &CancellationToken::new()).unwrap();
    let accumulation = result.accumulation.as_ref().unwrap();
    assert_eq!(accumulation.years.len(), 20);
    assert!((accumulation.total_deposits() - 140_000.0).abs() < 1e-6);
    assert!((accumulation.snapshot.cost_basis - 140_000.0).abs() < 1e-6);
    assert!(accumulation.snapshot.accumulated_advance_lump_sum > 0.0);
    assert!(accumulation.final_capital() > accumulation.total_deposits());

    let first = &result.withdrawal.rows[0];
    assert_eq!(first.year, 2045);
    assert_eq!(first.starting_capital, accumulation.final_capital());
    assert!((first.withdrawal - 0.04 * accumulation.final_capital()).abs() < 1e-6);
    assert!(result.accumulation_metrics.is_some());
}

#[test]
fn test_extra_capital_joins_at_cost() {
    let without = simulate(
        &validated(saver(ReturnProfile::Fixed { rate: 0.06 }, None)),
        &CancellationToken::new(),
    )
    .unwrap();
    let with = simulate(
        &validated(saver(ReturnProfile::Fixed { rate: 0.06 }, Some(100_000.0))),
        &CancellationToken::new(),
    )
    .unwrap();

    let base = without.withdrawal.rows[0].starting_capital;
    assert!((with.withdrawal.rows[0].starting_capital - (base + 100_000.0)).abs() < 1e-6);
    assert!((with.withdrawal.initial_capital - (base + 100_000.0)).abs() < 1e-6);
}

#[test]
fn test_savings_gains_are_taxed_at_sale() {
    let result = simulate(
        &validated(saver(ReturnProfile::Fixed { rate: 0.06 }, None)),
        &CancellationToken::new(),
    )
    .unwrap();
    let first = &result.withdrawal.rows[0];
    // Embedded gains make the first sale taxable beyond the Vorabpauschale
    assert!(first.tax_regime.is_some());
    assert!(first.tax_paid > 0.0);
}

#[test]
fn test_seeded_plan_is_reproducible() {
    let mut input = saver(ReturnProfile::MSCI_WORLD_NORMAL, None);
    input.seed = Some(42);
    let plan = validated(input);

    let a = simulate(&plan, &CancellationToken::new()).unwrap();
    let b = simulate(&plan, &CancellationToken::new()).unwrap();
    assert!(a.reproducible);
    assert_eq!(a.seed, 42);
    assert_eq!(a, b);
}

#[test]
fn test_withdrawal_profile_draws_own_stream() {
    let mut input = saver(ReturnProfile::MSCI_WORLD_NORMAL, None);
    input.seed = Some(42);
    if let Some(withdrawal) = input.withdrawal.as_mut() {
        withdrawal.returns = Some(ReturnProfile::Random {
            mean: 0.04,
            std_dev: 0.08,
        });
    }
    let plan = validated(input);

    let a = simulate(&plan, &CancellationToken::new()).unwrap();
    let b = simulate(&plan, &CancellationToken::new()).unwrap();
    assert!(a.reproducible);
    assert_eq!(a.withdrawal, b.withdrawal);
    assert_eq!(a.accumulation, b.accumulation);
}

#[test]
fn test_unseeded_stochastic_plan_is_not_reproducible() {
    let plan = validated(saver(ReturnProfile::MSCI_WORLD_NORMAL, None));
    let result = simulate(&plan, &CancellationToken::new()).unwrap();
    assert!(!result.reproducible);
}

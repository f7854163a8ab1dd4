//! Tests for withdrawal strategies inside complete runs
//!
//! These tests verify that:
//! - The bucket cushion is carved out at phase start, drawn first and refilled
//!   after strong years within its bounds
//! - The cushion counts as capital: payouts continue from it after the
//!   portfolio is gone
//! - Guardrails react to the previous year's return
//! - RMD, capital preservation and tax-optimized strategies size the first
//!   year from the right inputs

use std::collections::BTreeMap;

use crate::config::StrategyInput;
use crate::model::{PlanDuration, ReturnProfile, StrategyConfig, WithdrawalOutcome};
use crate::progress::CancellationToken;
use crate::simulation::simulate;

use super::{validated, withdrawal_plan};

fn variable(rates: &[(i16, f64)]) -> ReturnProfile {
    ReturnProfile::Variable {
        rates: rates.iter().copied().collect::<BTreeMap<_, _>>(),
        default_rate: 0.05,
    }
}

#[test]
fn test_bucket_first_year() {
    let plan = validated(withdrawal_plan(
        StrategyInput::Bucket {
            base_rate: None,
            cushion_size: None,
            refill_threshold: None,
            refill_percentage: None,
        },
        500_000.0,
        10,
        ReturnProfile::Fixed { rate: 0.10 },
    ));
    let result = simulate(&plan, &CancellationToken::new()).unwrap().withdrawal;
    let first = &result.rows[0];
    let bucket = first.bucket.unwrap();

    // 40,000 cushion carved out of 500,000
    assert!((first.starting_capital - 460_000.0).abs() < 1e-9);
    assert_eq!(bucket.cushion_start, 40_000.0);
    // 4% of the full 500,000 comes out of the cushion
    assert!((bucket.drawn_from_cushion - 20_000.0).abs() < 1e-9);
    // Refill: half of the 46,000 gain above the 10,000 threshold
    assert!((first.growth - 46_000.0).abs() < 1e-9);
    assert!((bucket.refill - 18_000.0).abs() < 1e-9);
    assert!((bucket.cushion_end - 38_000.0).abs() < 1e-9);
    assert!((first.withdrawal - 18_000.0).abs() < 1e-9);
    assert!((first.paid_out() - 20_000.0).abs() < 1e-9);
}

#[test]
fn test_bucket_cushion_bounds_over_volatile_path() {
    let mut input = withdrawal_plan(
        StrategyInput::Bucket {
            base_rate: Some(0.045),
            cushion_size: Some(60_000.0),
            refill_threshold: Some(5_000.0),
            refill_percentage: Some(0.4),
        },
        600_000.0,
        30,
        ReturnProfile::MSCI_WORLD_STUDENT_T,
    );
    input.seed = Some(2024);
    let plan = validated(input);
    let result = simulate(&plan, &CancellationToken::new()).unwrap().withdrawal;

    for row in &result.rows {
        let bucket = row.bucket.unwrap();
        assert!(bucket.cushion_start >= 0.0);
        assert!(bucket.cushion_end >= 0.0);
        let excess = row.growth - 5_000.0;
        assert!(bucket.refill <= (0.4 * excess).max(0.0) + 1e-9);
        assert!(bucket.refill <= 60_000.0 - (bucket.cushion_start - bucket.drawn_from_cushion) + 1e-9);
        assert!(row.ledger_residual().abs() < 1e-6);
    }
    for pair in result.rows.windows(2) {
        let (prev, next) = (pair[0].bucket.unwrap(), pair[1].bucket.unwrap());
        assert_eq!(prev.cushion_end, next.cushion_start);
    }
}

#[test]
fn test_bucket_threshold_below_gain_refills() {
    let plan = validated(withdrawal_plan(
        StrategyInput::Bucket {
            base_rate: None,
            cushion_size: None,
            refill_threshold: Some(5_000.0),
            refill_percentage: Some(0.25),
        },
        500_000.0,
        3,
        ReturnProfile::Fixed { rate: 0.10 },
    ));
    let result = simulate(&plan, &CancellationToken::new()).unwrap().withdrawal;
    let bucket = result.rows[0].bucket.unwrap();

    // A quarter of (46,000 - 5,000)
    assert_eq!(bucket.cushion_start, 40_000.0);
    assert!((bucket.drawn_from_cushion - 20_000.0).abs() < 1e-9);
    assert!((bucket.refill - 10_250.0).abs() < 1e-9);
}

#[test]
fn test_cushion_holding_all_capital_keeps_paying() {
    let plan = validated(withdrawal_plan(
        StrategyInput::Bucket {
            base_rate: None,
            cushion_size: Some(50_000.0),
            refill_threshold: None,
            refill_percentage: None,
        },
        50_000.0,
        10,
        ReturnProfile::Fixed { rate: 0.05 },
    ));
    let result = simulate(&plan, &CancellationToken::new()).unwrap().withdrawal;

    assert_eq!(result.rows.len(), 10);
    assert_eq!(result.outcome, WithdrawalOutcome::Completed);
    assert_eq!(result.duration(), PlanDuration::Unlimited);
    for row in &result.rows {
        assert_eq!(row.starting_capital, 0.0);
        assert!((row.paid_out() - 2_000.0).abs() < 1e-9);
    }
    assert!((result.final_capital() - 30_000.0).abs() < 1e-9);
    assert!((result.total_withdrawn() - 20_000.0).abs() < 1e-9);
}

#[test]
fn test_cushion_outlives_portfolio_crash() {
    let plan = validated(withdrawal_plan(
        StrategyInput::Bucket {
            base_rate: None,
            cushion_size: Some(40_000.0),
            refill_threshold: None,
            refill_percentage: None,
        },
        500_000.0,
        10,
        variable(&[(2040, -1.0)]),
    ));
    let result = simulate(&plan, &CancellationToken::new()).unwrap().withdrawal;

    // 2040 wipes out the portfolio, the cushion pays 2040 and 2041
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0].ending_capital, 0.0);
    assert_eq!(result.rows[0].bucket.unwrap().cushion_end, 20_000.0);
    assert_eq!(result.outcome, WithdrawalOutcome::Exhausted { year: 2041 });
    assert_eq!(result.duration(), PlanDuration::Years(2));
    assert!((result.total_withdrawn() - 40_000.0).abs() < 1e-9);
    assert_eq!(result.final_capital(), 0.0);
}

#[test]
fn test_guardrails_follow_prior_year() {
    let plan = validated(withdrawal_plan(
        StrategyInput::MonthlyFixed {
            monthly_amount: Some(2_000.0),
            guardrails: Some(true),
            guardrails_threshold: Some(0.10),
        },
        600_000.0,
        4,
        variable(&[(2040, 0.05), (2041, -0.20), (2042, 0.05), (2043, 0.30)]),
    ));
    let result = simulate(&plan, &CancellationToken::new()).unwrap().withdrawal;
    let amounts: Vec<f64> = result.rows.iter().map(|r| r.withdrawal).collect();

    assert!((amounts[0] - 24_000.0).abs() < 1e-6);
    assert!((amounts[1] - 24_000.0).abs() < 1e-6);
    // 2041 fell 25 points short of the 5% expectation
    assert!((amounts[2] - 18_000.0).abs() < 1e-6);
    assert!((amounts[3] - 24_000.0).abs() < 1e-6);
}

#[test]
fn test_dynamic_adjusts_after_strong_year() {
    let plan = validated(withdrawal_plan(
        StrategyInput::Dynamic {
            base_rate: None,
            upper_threshold: None,
            upper_adjustment: None,
            lower_threshold: None,
            lower_adjustment: None,
        },
        500_000.0,
        3,
        variable(&[(2040, 0.20), (2041, -0.10)]),
    ));
    let result = simulate(&plan, &CancellationToken::new()).unwrap().withdrawal;
    let amounts: Vec<f64> = result.rows.iter().map(|r| r.withdrawal).collect();

    assert!((amounts[0] - 20_000.0).abs() < 1e-6);
    assert!((amounts[1] - 21_000.0).abs() < 1e-6);
    assert!((amounts[2] - 19_000.0).abs() < 1e-6);
}

#[test]
fn test_rmd_uses_age_at_start() {
    let mut input = withdrawal_plan(
        StrategyInput::Rmd {
            start_age: None,
            life_table: None,
        },
        500_000.0,
        5,
        ReturnProfile::Fixed { rate: 0.04 },
    );
    if let Some(withdrawal) = input.withdrawal.as_mut() {
        withdrawal.birth_year = Some(1975);
    }
    let result = simulate(&validated(input), &CancellationToken::new())
        .unwrap()
        .withdrawal;
    // Age 65 in 2040: 19.1 remaining years
    assert!((result.rows[0].withdrawal - 500_000.0 / 19.1).abs() < 1e-6);
}

#[test]
fn test_capital_preservation_takes_real_return() {
    let plan = validated(withdrawal_plan(
        StrategyInput::CapitalPreservation {
            inflation_rate: None,
        },
        500_000.0,
        3,
        ReturnProfile::Fixed { rate: 0.05 },
    ));
    let result = simulate(&plan, &CancellationToken::new()).unwrap().withdrawal;
    // 5% expected return less 2% inflation
    assert!((result.rows[0].withdrawal - 15_000.0).abs() < 1e-6);
}

#[test]
fn test_tax_optimized_takes_maximum_without_gains() {
    let plan = validated(withdrawal_plan(
        StrategyInput::TaxOptimized {
            target_tax_rate: None,
            min_rate: None,
            max_rate: None,
        },
        500_000.0,
        3,
        ReturnProfile::Fixed { rate: 0.05 },
    ));
    assert!(matches!(
        plan.withdrawal.strategy,
        StrategyConfig::TaxOptimized { .. }
    ));
    let result = simulate(&plan, &CancellationToken::new()).unwrap().withdrawal;
    // Capital bought at cost carries almost no gain, so the cap binds
    assert!((result.rows[0].withdrawal - 30_000.0).abs() < 1e-6);
}

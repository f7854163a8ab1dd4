//! Tests for return profiles inside full plans
//!
//! These tests verify that:
//! - A seed fixes the generated sequence independent of call site
//! - Historical replays drive the withdrawal ledger year by year
//! - Drawn returns never fall below a total loss

use crate::config::StrategyInput;
use crate::model::{HistoricalIndex, ReturnGenerator, ReturnProfile};
use crate::progress::CancellationToken;
use crate::simulation::simulate;

use super::{validated, withdrawal_plan};

#[test]
fn test_same_seed_same_sequence_across_profiles() {
    for profile in [
        ReturnProfile::MSCI_WORLD_NORMAL,
        ReturnProfile::MSCI_WORLD_STUDENT_T,
        ReturnProfile::LogNormal {
            mean: 0.06,
            std_dev: 0.18,
        },
        ReturnProfile::Bootstrap {
            index: HistoricalIndex::Dax,
            block_size: 3,
        },
    ] {
        let a = ReturnGenerator::new(profile.clone(), Some(11))
            .generate(2025, 2074)
            .unwrap();
        let b = ReturnGenerator::new(profile, Some(11))
            .generate(2025, 2074)
            .unwrap();
        assert_eq!(a.len(), 50);
        assert_eq!(a, b);
    }
}

#[test]
fn test_historical_replay_drives_ledger() {
    let index = HistoricalIndex::MsciWorld;
    let first = index.first_year();
    let plan = validated(withdrawal_plan(
        StrategyInput::FourPercent,
        500_000.0,
        10,
        ReturnProfile::Historical {
            index,
            start_year: first,
        },
    ));
    let result = simulate(&plan, &CancellationToken::new()).unwrap().withdrawal;
    let expected: Vec<f64> = index.series().iter().take(result.rows.len()).map(|(_, r)| *r).collect();
    let actual: Vec<f64> = result.rows.iter().map(|row| row.return_rate).collect();
    assert_eq!(actual, expected);
    assert!(result.rows.iter().all(|row| (row.growth - row.starting_capital * row.return_rate).abs() < 1e-6));
}

#[test]
fn test_heavy_tails_clamped_at_total_loss() {
    let series = ReturnGenerator::new(
        ReturnProfile::StudentT {
            mean: 0.0,
            scale: 2.0,
            df: 1.5,
        },
        Some(5),
    )
    .generate(2000, 2499)
    .unwrap();
    assert!(series.rates().iter().all(|r| *r >= -1.0));
}

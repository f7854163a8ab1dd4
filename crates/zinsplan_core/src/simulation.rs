//! Plan-level entry points: one full projection and the Monte Carlo runner

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accumulation::simulate_accumulation;
use crate::analysis::{
    PerformanceMetrics, analyze_returns, percentile, returns_from_accumulation,
    returns_from_withdrawal,
};
use crate::config::ValidatedPlan;
use crate::error::{Result, SimulationError, ValidationErrors};
use crate::model::{
    AccumulationResult, FinalCapitalPercentiles, MonteCarloSummary, PortfolioSnapshot,
    ReturnGenerator, ReturnSeries, WithdrawalOutcome, WithdrawalResult,
};
use crate::progress::{CancellationToken, RunProgress};
use crate::withdrawal::WithdrawalSimulator;

/// Everything one projection of a plan produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    pub accumulation: Option<AccumulationResult>,
    pub withdrawal: WithdrawalResult,
    /// Seed the returns were drawn with (drawn from entropy when the plan has none)
    pub seed: u64,
    /// Whether re-running with `seed` reproduces this result
    pub reproducible: bool,
    pub accumulation_metrics: Option<PerformanceMetrics>,
    pub withdrawal_metrics: PerformanceMetrics,
}

/// Return series of both phases of one run
#[derive(Debug, Clone)]
pub(crate) struct PlanReturns {
    pub accumulation: Option<ReturnSeries>,
    pub withdrawal: ReturnSeries,
    pub seed: u64,
    pub reproducible: bool,
}

/// Draw the returns of both phases. The withdrawal phase continues the
/// savings-phase stream unless it has a profile of its own, which then gets
/// a stream seeded one past the plan seed.
pub(crate) fn generate_returns(plan: &ValidatedPlan, seed: Option<u64>) -> Result<PlanReturns> {
    let mut generator = ReturnGenerator::new(plan.returns.clone(), seed);
    let accumulation = plan
        .accumulation
        .as_ref()
        .map(|acc| generator.generate(acc.start_year, acc.end_year))
        .transpose()?;

    let start = plan.withdrawal.start_year;
    let end = plan.withdrawal_end_year();
    let (withdrawal, reproducible) = match &plan.withdrawal.returns {
        Some(profile) => {
            let mut own = ReturnGenerator::new(profile.clone(), Some(generator.seed().wrapping_add(1)));
            let reproducible = seed.is_some()
                || (!profile.is_stochastic()
                    && (accumulation.is_none() || generator.is_reproducible()));
            (own.generate(start, end)?, reproducible)
        }
        None => (generator.generate(start, end)?, generator.is_reproducible()),
    };

    Ok(PlanReturns {
        accumulation,
        withdrawal,
        seed: generator.seed(),
        reproducible,
    })
}

/// Capital entering the withdrawal phase: the savings portfolio plus any
/// capital held outside it
pub(crate) fn starting_snapshot(
    plan: &ValidatedPlan,
    accumulation: Option<&AccumulationResult>,
) -> PortfolioSnapshot {
    let base = accumulation.map(|acc| acc.snapshot).unwrap_or_default();
    let extra = PortfolioSnapshot::at_cost(plan.withdrawal.initial_capital);
    PortfolioSnapshot {
        capital: base.capital + extra.capital,
        cost_basis: base.cost_basis + extra.cost_basis,
        accumulated_advance_lump_sum: base.accumulated_advance_lump_sum,
    }
}

pub(crate) fn run_accumulation(
    plan: &ValidatedPlan,
    returns: Option<&ReturnSeries>,
    cancel: &CancellationToken,
) -> Result<Option<AccumulationResult>> {
    match (&plan.accumulation, returns) {
        (Some(acc), Some(series)) => {
            simulate_accumulation(acc, &plan.tax, series, cancel).map(Some)
        }
        (Some(acc), None) => Err(SimulationError::MissingReturn(acc.start_year)),
        (None, _) => Ok(None),
    }
}

/// Project the plan once: savings phase (if any), then the withdrawal phase
/// with the plan's own strategy.
pub fn simulate(plan: &ValidatedPlan, cancel: &CancellationToken) -> Result<PlanResult> {
    let returns = generate_returns(plan, plan.seed)?;
    debug!(
        seed = returns.seed,
        reproducible = returns.reproducible,
        "simulating plan"
    );

    let accumulation = run_accumulation(plan, returns.accumulation.as_ref(), cancel)?;
    let snapshot = starting_snapshot(plan, accumulation.as_ref());
    let withdrawal = WithdrawalSimulator::new(plan, snapshot, &returns.withdrawal).run(cancel)?;

    let accumulation_metrics = accumulation
        .as_ref()
        .map(|acc| analyze_returns(&returns_from_accumulation(acc)));
    let withdrawal_metrics = analyze_returns(&returns_from_withdrawal(&withdrawal));

    Ok(PlanResult {
        accumulation,
        withdrawal,
        seed: returns.seed,
        reproducible: returns.reproducible,
        accumulation_metrics,
        withdrawal_metrics,
    })
}

/// Outcome of one Monte Carlo iteration
#[derive(Debug, Clone, Copy)]
struct IterationOutcome {
    final_capital: f64,
    depleted_in: Option<i16>,
}

fn run_iteration(
    plan: &ValidatedPlan,
    seed: u64,
    progress: &RunProgress,
) -> Result<IterationOutcome> {
    let returns = generate_returns(plan, Some(seed))?;
    let accumulation = run_accumulation(plan, returns.accumulation.as_ref(), progress.token())?;
    let snapshot = starting_snapshot(plan, accumulation.as_ref());
    let withdrawal =
        WithdrawalSimulator::new(plan, snapshot, &returns.withdrawal).run(progress.token())?;
    progress.increment();

    Ok(IterationOutcome {
        final_capital: withdrawal.final_capital(),
        depleted_in: match withdrawal.outcome {
            WithdrawalOutcome::Exhausted { year } => Some(year),
            WithdrawalOutcome::Completed => None,
        },
    })
}

/// Run the plan `iterations` times on independent return paths.
///
/// Iteration seeds are drawn up front from a `ChaCha8Rng` seeded with the
/// plan seed, so a seeded plan yields the same summary regardless of how the
/// iterations are scheduled.
pub fn monte_carlo(
    plan: &ValidatedPlan,
    iterations: usize,
    cancel: &CancellationToken,
) -> Result<MonteCarloSummary> {
    if iterations == 0 {
        let mut errors = ValidationErrors::default();
        errors.push("iterations", "must be at least 1");
        return Err(errors.into());
    }

    let master_seed = plan.seed.unwrap_or_else(|| rand::rng().next_u64());
    let mut master = ChaCha8Rng::seed_from_u64(master_seed);
    let seeds: Vec<u64> = (0..iterations).map(|_| master.next_u64()).collect();
    let progress = RunProgress::new(iterations, cancel.clone());
    debug!(iterations, seed = master_seed, "starting monte carlo");

    #[cfg(feature = "parallel")]
    let outcomes: Result<Vec<IterationOutcome>> = seeds
        .par_iter()
        .map(|&seed| run_iteration(plan, seed, &progress))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let outcomes: Result<Vec<IterationOutcome>> = seeds
        .iter()
        .map(|&seed| run_iteration(plan, seed, &progress))
        .collect();
    let outcomes = outcomes?;

    let mut finals: Vec<f64> = outcomes.iter().map(|o| o.final_capital).collect();
    finals.sort_by(f64::total_cmp);
    let mut depletion_years: Vec<i16> = outcomes.iter().filter_map(|o| o.depleted_in).collect();
    depletion_years.sort_unstable();

    let successes = iterations - depletion_years.len();
    let median_depletion_year = (!depletion_years.is_empty())
        .then(|| depletion_years[(depletion_years.len() - 1) / 2]);

    debug!(
        completed = progress.completed(),
        successes, "monte carlo finished"
    );

    Ok(MonteCarloSummary {
        iterations,
        seed: master_seed,
        success_rate: successes as f64 / iterations as f64,
        final_capital: FinalCapitalPercentiles {
            p5: percentile(&finals, 0.05),
            p10: percentile(&finals, 0.10),
            p25: percentile(&finals, 0.25),
            p50: percentile(&finals, 0.50),
            p75: percentile(&finals, 0.75),
            p90: percentile(&finals, 0.90),
            p95: percentile(&finals, 0.95),
        },
        mean_final_capital: finals.iter().sum::<f64>() / iterations as f64,
        median_depletion_year,
    })
}

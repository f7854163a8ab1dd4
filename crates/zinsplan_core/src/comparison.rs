//! Side-by-side runs of several withdrawal strategies
//!
//! Every strategy starts from the same savings-phase snapshot and sees the
//! same yearly returns, so differences between results come from the
//! strategies alone. Results are never mutated after the runs; ordering is
//! done on demand with [`Comparison::ranked`].

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::{PerformanceMetrics, analyze_returns, returns_from_withdrawal};
use crate::config::ValidatedPlan;
use crate::error::Result;
use crate::model::{
    PlanDuration, ReturnGenerator, ReturnProfile, ReturnSeries, StrategyConfig, WithdrawalResult,
    YearLedgerRow,
};
use crate::progress::{CancellationToken, RunProgress};
use crate::simulation::{generate_returns, run_accumulation, starting_snapshot};
use crate::withdrawal::WithdrawalSimulator;

/// How the shared return path was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum ComparisonBasis {
    /// Deterministic return profiles
    Deterministic,
    /// One random path drawn with this seed, shared by every strategy
    SharedSeed { seed: u64 },
    /// Stochastic profile without a seed: stochastic phases run on the
    /// profile's expected return, deterministic phases on their own series
    ExpectedValue,
}

impl ComparisonBasis {
    #[must_use]
    pub fn label(self) -> String {
        match self {
            ComparisonBasis::Deterministic => "deterministic returns".to_string(),
            ComparisonBasis::SharedSeed { seed } => format!("shared random path (seed {seed})"),
            ComparisonBasis::ExpectedValue => "expected-value returns only".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub name: String,
    pub strategy: StrategyConfig,
    pub final_capital: f64,
    pub total_withdrawn: f64,
    pub average_annual_withdrawal: f64,
    pub duration: PlanDuration,
    pub total_taxes: f64,
    /// Capped for display
    pub metrics: PerformanceMetrics,
    pub ledger: Option<Vec<YearLedgerRow>>,
}

impl ComparisonResult {
    fn from_run(name: String, result: WithdrawalResult, include_ledger: bool) -> Self {
        let metrics = analyze_returns(&returns_from_withdrawal(&result)).capped();
        Self {
            name,
            final_capital: result.final_capital(),
            total_withdrawn: result.total_withdrawn(),
            average_annual_withdrawal: result.average_annual_withdrawal(),
            duration: result.duration(),
            total_taxes: result.total_taxes(),
            metrics,
            ledger: include_ledger.then_some(result.rows),
            strategy: result.strategy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingKey {
    FinalCapital,
    TotalWithdrawn,
    /// Longer-lasting first; unlimited beats any finite duration
    Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub basis: ComparisonBasis,
    /// Plan strategy first, then the variants in configuration order
    pub results: Vec<ComparisonResult>,
}

impl Comparison {
    /// Results from best to worst by `key`; ties keep configuration order
    #[must_use]
    pub fn ranked(&self, key: RankingKey) -> Vec<&ComparisonResult> {
        let mut ranked: Vec<&ComparisonResult> = self.results.iter().collect();
        match key {
            RankingKey::FinalCapital => {
                ranked.sort_by(|a, b| b.final_capital.total_cmp(&a.final_capital));
            }
            RankingKey::TotalWithdrawn => {
                ranked.sort_by(|a, b| b.total_withdrawn.total_cmp(&a.total_withdrawn));
            }
            RankingKey::Duration => ranked.sort_by(|a, b| b.duration.cmp(&a.duration)),
        }
        ranked
    }

    #[must_use]
    pub fn best(&self, key: RankingKey) -> Option<&ComparisonResult> {
        self.ranked(key).first().copied()
    }
}

fn basis_for(plan: &ValidatedPlan) -> ComparisonBasis {
    let savings_stochastic = plan.accumulation.is_some() && plan.returns.is_stochastic();
    let stochastic = savings_stochastic || plan.withdrawal_returns().is_stochastic();
    match (stochastic, plan.seed) {
        (false, _) => ComparisonBasis::Deterministic,
        (true, Some(seed)) => ComparisonBasis::SharedSeed { seed },
        (true, None) => ComparisonBasis::ExpectedValue,
    }
}

/// The expected return for a stochastic profile, the profile's own series
/// otherwise
fn expected_path(profile: &ReturnProfile, start_year: i16, end_year: i16) -> Result<ReturnSeries> {
    if profile.is_stochastic() {
        Ok(ReturnSeries::constant(start_year, end_year, profile.expected_return()))
    } else {
        Ok(ReturnGenerator::new(profile.clone(), None).generate(start_year, end_year)?)
    }
}

/// Run the plan's strategy and every comparison variant on one shared
/// savings result and return path.
pub fn compare_strategies(
    plan: &ValidatedPlan,
    include_ledger: bool,
    cancel: &CancellationToken,
) -> Result<Comparison> {
    let basis = basis_for(plan);
    let end_year = plan.withdrawal_end_year();
    let (accumulation_returns, withdrawal_returns) = match basis {
        ComparisonBasis::ExpectedValue => (
            plan.accumulation
                .as_ref()
                .map(|acc| expected_path(&plan.returns, acc.start_year, acc.end_year))
                .transpose()?,
            expected_path(plan.withdrawal_returns(), plan.withdrawal.start_year, end_year)?,
        ),
        _ => {
            let returns = generate_returns(plan, plan.seed)?;
            (returns.accumulation, returns.withdrawal)
        }
    };

    let accumulation = run_accumulation(plan, accumulation_returns.as_ref(), cancel)?;
    let snapshot = starting_snapshot(plan, accumulation.as_ref());

    let mut runs: Vec<(String, &StrategyConfig)> =
        vec![(plan.withdrawal.strategy.label(), &plan.withdrawal.strategy)];
    runs.extend(
        plan.comparison_variants
            .iter()
            .map(|variant| (variant.name.clone(), &variant.strategy)),
    );
    debug!(strategies = runs.len(), basis = %basis.label(), "comparing strategies");

    let progress = RunProgress::new(runs.len(), cancel.clone());
    let run = |(name, strategy): &(String, &StrategyConfig)| -> Result<ComparisonResult> {
        let result = WithdrawalSimulator::with_strategy(plan, strategy, snapshot, &withdrawal_returns)
            .run(progress.token())?;
        progress.increment();
        Ok(ComparisonResult::from_run(name.clone(), result, include_ledger))
    };

    #[cfg(feature = "parallel")]
    let results: Result<Vec<ComparisonResult>> = runs.par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let results: Result<Vec<ComparisonResult>> = runs.iter().map(run).collect();

    Ok(Comparison {
        basis,
        results: results?,
    })
}

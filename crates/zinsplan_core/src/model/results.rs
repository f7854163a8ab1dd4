//! Simulation results
//!
//! Plain data produced by the simulators and consumed by reports. Nothing in
//! here mutates simulation state.

use serde::{Deserialize, Serialize};

use super::contributions::ContributionElement;
use super::strategy::StrategyConfig;
use crate::taxes::{HealthInsuranceYear, OtherIncomeYear, PensionYear, TaxRegime};

/// Aggregate of all contribution elements for one savings year
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccumulationYear {
    pub year: i16,
    pub starting_capital: f64,
    pub deposits: f64,
    pub growth: f64,
    pub costs: f64,
    pub tax_paid: f64,
    pub allowance_used: f64,
    pub advance_lump_sum: f64,
    pub ending_capital: f64,
}

/// Portfolio handed from the savings phase to the withdrawal phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub capital: f64,
    /// Sum of deposits still held
    pub cost_basis: f64,
    /// Vorabpauschalen already taxed on the holdings
    pub accumulated_advance_lump_sum: f64,
}

impl PortfolioSnapshot {
    /// A holding bought at its current value (no unrealized gain)
    #[must_use]
    pub fn at_cost(capital: f64) -> Self {
        PortfolioSnapshot {
            capital,
            cost_basis: capital,
            accumulated_advance_lump_sum: 0.0,
        }
    }

    /// Unrealized gain not yet covered by taxed Vorabpauschalen
    #[must_use]
    pub fn unrealized_gain(&self) -> f64 {
        (self.capital - self.cost_basis - self.accumulated_advance_lump_sum).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulationResult {
    pub elements: Vec<ContributionElement>,
    pub years: Vec<AccumulationYear>,
    pub snapshot: PortfolioSnapshot,
}

impl AccumulationResult {
    #[must_use]
    pub fn final_capital(&self) -> f64 {
        self.snapshot.capital
    }

    #[must_use]
    pub fn total_deposits(&self) -> f64 {
        self.years.iter().map(|y| y.deposits).sum()
    }

    #[must_use]
    pub fn total_taxes(&self) -> f64 {
        self.years.iter().map(|y| y.tax_paid).sum()
    }
}

/// Cash-cushion movements of the bucket strategy in one year
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketYear {
    pub cushion_start: f64,
    pub drawn_from_cushion: f64,
    /// Moved from the portfolio into the cushion (part of the row's withdrawal)
    pub refill: f64,
    pub cushion_end: f64,
}

/// One year of the withdrawal phase.
///
/// `ending_capital = starting_capital + growth - withdrawal - tax_paid` holds
/// for every row. `withdrawal` is the amount sold from the portfolio and
/// `tax_paid` the capital-gains tax charged to it (Vorabpauschale included).
/// Income tax and insurance are paid from the cash flow, not the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearLedgerRow {
    pub year: i16,
    pub starting_capital: f64,
    pub withdrawal: f64,
    /// Withdrawal in money of the first withdrawal year
    pub withdrawal_real: Option<f64>,
    pub return_rate: f64,
    pub growth: f64,
    pub tax_paid: f64,
    pub advance_lump_sum: f64,
    pub allowance_used: f64,
    pub income_tax: Option<f64>,
    pub basic_allowance_used: Option<f64>,
    pub pension: Option<PensionYear>,
    pub other_income: Option<OtherIncomeYear>,
    pub health_insurance: Option<HealthInsuranceYear>,
    pub bucket: Option<BucketYear>,
    /// Regime of the realized-gain tax when gains were realized
    pub tax_regime: Option<TaxRegime>,
    /// Money available for spending after taxes and insurance
    pub net_cash_flow: f64,
    pub ending_capital: f64,
}

impl YearLedgerRow {
    /// Amount paid out to the retiree, cushion draws included, refills excluded
    #[must_use]
    pub fn paid_out(&self) -> f64 {
        match self.bucket {
            Some(bucket) => self.withdrawal - bucket.refill + bucket.drawn_from_cushion,
            None => self.withdrawal,
        }
    }

    #[must_use]
    pub fn ledger_residual(&self) -> f64 {
        self.starting_capital + self.growth - self.withdrawal - self.tax_paid - self.ending_capital
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WithdrawalOutcome {
    /// Horizon reached with capital left
    Completed,
    /// Capital ran out in `year`; no rows follow it
    Exhausted { year: i16 },
}

/// How long the capital lasted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanDuration {
    Years(u16),
    /// The capital outlived the horizon
    Unlimited,
}

impl PlanDuration {
    #[must_use]
    pub fn years(self) -> Option<u16> {
        match self {
            PlanDuration::Years(years) => Some(years),
            PlanDuration::Unlimited => None,
        }
    }
}

impl std::fmt::Display for PlanDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanDuration::Years(years) => write!(f, "{years} years"),
            PlanDuration::Unlimited => write!(f, "unlimited"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalResult {
    pub strategy: StrategyConfig,
    /// Capital at the start of the phase, cushion included
    pub initial_capital: f64,
    pub rows: Vec<YearLedgerRow>,
    pub outcome: WithdrawalOutcome,
}

impl WithdrawalResult {
    /// Portfolio plus remaining cushion after the last row
    #[must_use]
    pub fn final_capital(&self) -> f64 {
        self.rows.last().map_or(self.initial_capital, |row| {
            row.ending_capital + row.bucket.map_or(0.0, |b| b.cushion_end)
        })
    }

    #[must_use]
    pub fn total_withdrawn(&self) -> f64 {
        self.rows.iter().map(YearLedgerRow::paid_out).sum()
    }

    #[must_use]
    pub fn average_annual_withdrawal(&self) -> f64 {
        if self.rows.is_empty() {
            0.0
        } else {
            self.total_withdrawn() / self.rows.len() as f64
        }
    }

    #[must_use]
    pub fn duration(&self) -> PlanDuration {
        match self.outcome {
            WithdrawalOutcome::Completed => PlanDuration::Unlimited,
            WithdrawalOutcome::Exhausted { .. } => PlanDuration::Years(self.rows.len() as u16),
        }
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self.outcome, WithdrawalOutcome::Exhausted { .. })
    }

    /// Capital-gains taxes charged to the portfolio
    #[must_use]
    pub fn total_taxes(&self) -> f64 {
        self.rows.iter().map(|r| r.tax_paid).sum()
    }

    #[must_use]
    pub fn total_income_tax(&self) -> f64 {
        self.rows.iter().filter_map(|r| r.income_tax).sum()
    }

    /// `(year, ending capital)` of every row
    #[must_use]
    pub fn capital_series(&self) -> Vec<(i16, f64)> {
        self.rows.iter().map(|r| (r.year, r.ending_capital)).collect()
    }
}

/// Distribution of final capital across Monte Carlo iterations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalCapitalPercentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub iterations: usize,
    pub seed: u64,
    /// Share of iterations that never exhausted the capital
    pub success_rate: f64,
    pub final_capital: FinalCapitalPercentiles,
    pub mean_final_capital: f64,
    /// Median exhaustion year among the failed iterations
    pub median_depletion_year: Option<i16>,
}

//! Withdrawal-phase state machine
//!
//! `Initialized -> Running(year) -> Completed | Exhausted`. A run is
//! exhausted once the portfolio and the bucket cushion are both empty. Each
//! call to [`WithdrawalSimulator::step`] appends exactly one ledger row.
//! Within a year the order is fixed:
//!
//! 1. growth on the start-of-year capital
//! 2. Vorabpauschale on the start-of-year holding, first claim on the
//!    Sparerpauschbetrag
//! 3. strategy amount (and bucket cushion split/refill)
//! 4. realized gain of the sale, second claim on the same allowance pool,
//!    then the Günstigerprüfung on what remains
//! 5. sale and capital-gains tax leave the portfolio
//! 6. pension, other income, income tax and health insurance shape the net
//!    cash flow without touching the portfolio

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::{ValidatedPlan, WithdrawalConfig};
use crate::error::{Result, SimulationError};
use crate::model::{
    BucketYear, PortfolioSnapshot, ReturnSeries, StrategyConfig, TaxConfig, WithdrawalOutcome,
    WithdrawalResult, YearLedgerRow,
};
use crate::progress::CancellationToken;
use crate::strategy::{
    BucketState, StrategyContext, TaxOutlook, bucket_refill, compute_withdrawal,
    split_bucket_withdrawal,
};
use crate::taxes::{
    AllowancePool, FavorabilityOutcome, PensionYear, advance_lump_sum_tax, gain_ratio, health_insurance_contributions,
    income_tax_with_basic_allowance, other_income_for_year, realized_gain, tax_on_realized_gain,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SimulationPhase {
    Initialized,
    /// `year` is the last year simulated so far
    Running { year: i16 },
    Completed,
    Exhausted { year: i16 },
}

impl SimulationPhase {
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            SimulationPhase::Completed | SimulationPhase::Exhausted { .. }
        )
    }
}

/// Relative tolerance of the per-row ledger identity
const LEDGER_TOLERANCE: f64 = 1e-6;

/// Projects one withdrawal strategy year by year
#[derive(Debug)]
pub struct WithdrawalSimulator<'a> {
    config: &'a WithdrawalConfig,
    strategy: &'a StrategyConfig,
    tax: &'a TaxConfig,
    returns: &'a ReturnSeries,
    inflation_rate: f64,
    expected_return: f64,
    end_year: i16,

    phase: SimulationPhase,
    /// Capital at phase start, cushion included
    initial_capital: f64,
    capital: f64,
    cost_basis: f64,
    accumulated_advance_lump_sum: f64,
    bucket: Option<BucketState>,
    prior_return: f64,
    rows: Vec<YearLedgerRow>,
}

impl<'a> WithdrawalSimulator<'a> {
    /// Simulator for the plan's own strategy
    #[must_use]
    pub fn new(plan: &'a ValidatedPlan, snapshot: PortfolioSnapshot, returns: &'a ReturnSeries) -> Self {
        Self::with_strategy(plan, &plan.withdrawal.strategy, snapshot, returns)
    }

    /// Simulator for `strategy` with everything else taken from the plan.
    /// `strategy` must have been validated with the plan (a comparison
    /// variant or the plan's own strategy).
    #[must_use]
    pub fn with_strategy(
        plan: &'a ValidatedPlan,
        strategy: &'a StrategyConfig,
        snapshot: PortfolioSnapshot,
        returns: &'a ReturnSeries,
    ) -> Self {
        let mut capital = snapshot.capital.max(0.0);
        let mut cost_basis = snapshot.cost_basis.max(0.0);
        let mut accumulated = snapshot.accumulated_advance_lump_sum.max(0.0);

        // The cushion is set aside from the portfolio at phase start
        let bucket = match strategy {
            StrategyConfig::Bucket { cushion_size, .. } => {
                let cushion = cushion_size.min(capital);
                if capital > 0.0 {
                    let kept = 1.0 - cushion / capital;
                    cost_basis *= kept;
                    accumulated *= kept;
                }
                capital -= cushion;
                Some(BucketState { cushion })
            }
            _ => None,
        };

        WithdrawalSimulator {
            config: &plan.withdrawal,
            strategy,
            tax: &plan.tax,
            returns,
            inflation_rate: plan.inflation_rate,
            expected_return: plan.withdrawal_returns().expected_return(),
            end_year: plan.withdrawal_end_year(),
            phase: SimulationPhase::Initialized,
            initial_capital: snapshot.capital.max(0.0),
            capital,
            cost_basis,
            accumulated_advance_lump_sum: accumulated,
            bucket,
            prior_return: 0.0,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    #[must_use]
    pub fn rows(&self) -> &[YearLedgerRow] {
        &self.rows
    }

    fn next_year(&self) -> Option<i16> {
        match self.phase {
            SimulationPhase::Initialized => {
                (self.config.start_year <= self.end_year).then_some(self.config.start_year)
            }
            SimulationPhase::Running { year } if year < self.end_year => Some(year + 1),
            _ => None,
        }
    }

    /// Simulate the next year. Returns `Ok(false)` once the run is finished.
    pub fn step(&mut self, cancel: &CancellationToken) -> Result<bool> {
        let Some(year) = self.next_year() else {
            if !self.phase.is_finished() {
                self.phase = SimulationPhase::Completed;
            }
            return Ok(false);
        };
        if cancel.is_cancelled() {
            debug!(year, "withdrawal cancelled");
            return Err(SimulationError::Cancelled);
        }

        let rate = self
            .returns
            .rate(year)
            .ok_or(SimulationError::MissingReturn(year))?;
        let year_index = (year - self.config.start_year) as u16;
        if year_index == 0 {
            self.prior_return = self.expected_return;
        }

        let mut row = self.simulate_year(year, year_index, rate);
        enforce_row_invariants(&mut row);

        // The cushion is capital too: payouts continue from it once the
        // portfolio is gone
        let cushion = self.bucket.map_or(0.0, |state| state.cushion);
        let exhausted = row.ending_capital <= 0.0 && cushion <= 0.0;
        self.capital = row.ending_capital;
        self.prior_return = rate;
        self.rows.push(row);

        self.phase = if exhausted {
            warn!(year, strategy = %self.strategy.label(), "capital exhausted");
            SimulationPhase::Exhausted { year }
        } else if year >= self.end_year {
            SimulationPhase::Completed
        } else {
            SimulationPhase::Running { year }
        };
        Ok(true)
    }

    fn simulate_year(&mut self, year: i16, year_index: u16, rate: f64) -> YearLedgerRow {
        let tax = self.tax;
        let starting_capital = self.capital;
        let growth = starting_capital * rate;
        let value = (starting_capital + growth).max(0.0);
        let inflation_index = (1.0 + self.inflation_rate).powi(i32::from(year_index));
        let inflation_factor = if self.config.inflation_adjusted && self.strategy.is_inflation_indexed() {
            inflation_index
        } else {
            1.0
        };

        // Vorabpauschale first, realized gains second, one pool
        let mut pool = AllowancePool::new(tax.allowance_for(year));
        let lump_sum = advance_lump_sum_tax(
            starting_capital,
            tax.base_rate_for(year),
            tax.partial_exemption,
            tax.flat_tax_rate,
            Some(growth),
        );
        let lump_sum_allowance = pool.consume(lump_sum.taxable);
        let lump_sum_tax = lump_sum_allowance.taxable_after_allowance * tax.flat_tax_rate;

        let basis = self.cost_basis + self.accumulated_advance_lump_sum;
        let ctx = StrategyContext {
            year,
            year_index,
            initial_capital: self.initial_capital,
            current_capital: starting_capital,
            prior_return: self.prior_return,
            inflation_factor,
            age: self.config.age_in(year),
            tax: TaxOutlook {
                gain_ratio: gain_ratio(value, basis),
                partial_exemption: tax.partial_exemption,
                flat_tax_rate: tax.flat_tax_rate,
                personal_marginal_rate: tax.personal_marginal_rate,
                allowance_remaining: pool.remaining(),
            },
        };
        let amount = compute_withdrawal(self.strategy, &ctx);

        let (mut sale, mut bucket_year) = match (self.strategy, self.bucket) {
            (
                StrategyConfig::Bucket {
                    cushion_size,
                    refill_threshold,
                    refill_percentage,
                    ..
                },
                Some(state),
            ) => {
                let (split, after_draw) = split_bucket_withdrawal(amount, state);
                let refill = bucket_refill(
                    *refill_threshold,
                    *refill_percentage,
                    cushion_size * inflation_factor,
                    growth,
                    after_draw,
                    value - split.from_portfolio,
                );
                (
                    split.from_portfolio + refill,
                    Some(BucketYear {
                        cushion_start: state.cushion,
                        drawn_from_cushion: split.from_cushion,
                        refill,
                        cushion_end: after_draw.cushion + refill,
                    }),
                )
            }
            _ => (amount, None),
        };

        let mut sale_tax = SaleTax::levy(tax, pool, sale, value, basis);
        let mut tax_paid = lump_sum_tax + sale_tax.tax.tax;
        let mut ending_capital = starting_capital + growth - sale - tax_paid;

        if ending_capital <= 0.0 {
            // Last year: the whole holding is sold and taxed, the rest is paid out
            sale_tax = SaleTax::levy(tax, pool, value, value, basis);
            tax_paid = (lump_sum_tax + sale_tax.tax.tax).min(value);
            sale = value - tax_paid;
            ending_capital = 0.0;
            if let Some(bucket) = bucket_year.as_mut() {
                bucket.refill = 0.0;
                bucket.cushion_end = bucket.cushion_start - bucket.drawn_from_cushion;
            }
        }

        // Shares sold (for the withdrawal and the tax) leave the basis pro rata
        let sold_fraction = if value > 0.0 {
            ((sale + tax_paid) / value).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.cost_basis *= 1.0 - sold_fraction;
        self.accumulated_advance_lump_sum =
            (self.accumulated_advance_lump_sum + lump_sum.amount) * (1.0 - sold_fraction);
        if let (Some(state), Some(bucket)) = (self.bucket.as_mut(), bucket_year.as_ref()) {
            state.cushion = bucket.cushion_end;
        }

        let mut row = YearLedgerRow {
            year,
            starting_capital,
            withdrawal: sale,
            withdrawal_real: None,
            return_rate: rate,
            growth,
            tax_paid,
            advance_lump_sum: lump_sum.amount,
            allowance_used: lump_sum_allowance.consumed + sale_tax.allowance_used,
            income_tax: None,
            basic_allowance_used: None,
            pension: None,
            other_income: None,
            health_insurance: None,
            bucket: bucket_year,
            tax_regime: (sale_tax.realized > 0.0).then_some(sale_tax.tax.regime),
            net_cash_flow: 0.0,
            ending_capital,
        };
        if self.config.inflation_adjusted {
            row.withdrawal_real = Some(row.paid_out() / inflation_index);
        }
        self.apply_income(&mut row, year_index);
        row
    }

    /// Pension, other income, income tax and health insurance of the row's year
    fn apply_income(&self, row: &mut YearLedgerRow, year_index: u16) {
        let mut pension = self
            .config
            .pension
            .as_ref()
            .and_then(|p| PensionYear::for_year(p, row.year));
        if let Some(pension) = pension.as_mut() {
            let income_tax = income_tax_with_basic_allowance(
                pension.taxable,
                self.tax.basic_allowance,
                &self.tax.income_tax_schedule,
            );
            pension.tax = income_tax.tax;
            pension.net = pension.gross - income_tax.tax;
            row.income_tax = Some(income_tax.tax);
            row.basic_allowance_used = Some(income_tax.basic_allowance_used);
        }

        let other_income =
            other_income_for_year(&self.config.other_income, row.year, self.inflation_rate);
        let health = self.config.health_insurance.as_ref().map(|insurance| {
            health_insurance_contributions(
                insurance,
                pension.map_or(0.0, |p| p.gross),
                other_income.map_or(0.0, |o| o.gross_amount),
                year_index,
            )
        });

        row.net_cash_flow = row.paid_out() + pension.map_or(0.0, |p| p.net)
            + other_income.map_or(0.0, |o| o.net_amount)
            - health.map_or(0.0, |h| h.total_annual());
        row.pension = pension;
        row.other_income = other_income;
        row.health_insurance = health;
    }

    /// Run until the horizon ends or the capital is exhausted
    pub fn run(mut self, cancel: &CancellationToken) -> Result<WithdrawalResult> {
        debug!(
            start_year = self.config.start_year,
            end_year = self.end_year,
            capital = self.initial_capital,
            strategy = %self.strategy.label(),
            "starting withdrawal phase"
        );
        while self.step(cancel)? {}
        Ok(self.into_result())
    }

    /// Result of the years simulated so far
    #[must_use]
    pub fn into_result(self) -> WithdrawalResult {
        let outcome = match self.phase {
            SimulationPhase::Exhausted { year } => WithdrawalOutcome::Exhausted { year },
            _ => WithdrawalOutcome::Completed,
        };
        WithdrawalResult {
            strategy: self.strategy.clone(),
            initial_capital: self.initial_capital,
            rows: self.rows,
            outcome,
        }
    }
}

/// Capital-gains tax on one sale, charged against what is left of the
/// year's allowance pool
#[derive(Debug, Clone, Copy)]
struct SaleTax {
    realized: f64,
    allowance_used: f64,
    tax: FavorabilityOutcome,
}

impl SaleTax {
    fn levy(tax: &TaxConfig, mut pool: AllowancePool, sale: f64, value: f64, basis: f64) -> Self {
        let realized = realized_gain(sale, value, basis);
        let allowance = pool.consume(realized * (1.0 - tax.partial_exemption));
        SaleTax {
            realized,
            allowance_used: allowance.consumed,
            tax: tax_on_realized_gain(
                allowance.taxable_after_allowance,
                tax.flat_tax_rate,
                tax.personal_marginal_rate,
            ),
        }
    }
}

/// Contract checks on a finished row: fatal in debug builds, logged and
/// clamped in release builds
fn enforce_row_invariants(row: &mut YearLedgerRow) {
    debug_assert!(
        row.ending_capital >= 0.0,
        "year {}: negative ending capital {}",
        row.year,
        row.ending_capital
    );
    if row.ending_capital < 0.0 || !row.ending_capital.is_finite() {
        error!(year = row.year, ending_capital = row.ending_capital, "clamping invalid ending capital");
        row.ending_capital = 0.0;
    }

    let tolerance = LEDGER_TOLERANCE * row.starting_capital.abs().max(1.0);
    let residual = row.ledger_residual();
    debug_assert!(
        residual.abs() <= tolerance,
        "year {}: ledger off by {residual}",
        row.year
    );
    if residual.abs() > tolerance {
        error!(year = row.year, residual, "ledger identity violated, adjusting tax");
        row.tax_paid = (row.tax_paid + residual).max(0.0);
        row.withdrawal = row.starting_capital + row.growth - row.tax_paid - row.ending_capital;
    }
}

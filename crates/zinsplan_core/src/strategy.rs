//! Withdrawal strategy resolver
//!
//! [`compute_withdrawal`] is a pure function of the year context and the
//! strategy parameters. The only cross-year state besides capital is the
//! bucket strategy's cash cushion, which callers thread through
//! [`BucketState`] explicitly.

use serde::{Deserialize, Serialize};

use crate::model::StrategyConfig;
use crate::optimization::{BISECTION_MAX_ITERATIONS, BISECTION_TOLERANCE, maximize_feasible};
use crate::taxes::{apply_annual_allowance, tax_on_realized_gain};

/// Tax position of the portfolio before this year's sale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxOutlook {
    /// Share of every euro sold that is taxable gain
    pub gain_ratio: f64,
    pub partial_exemption: f64,
    pub flat_tax_rate: f64,
    pub personal_marginal_rate: Option<f64>,
    /// Sparerpauschbetrag left after this year's Vorabpauschale
    pub allowance_remaining: f64,
}

impl TaxOutlook {
    /// Capital-gains tax a sale of `amount` would trigger
    #[must_use]
    pub fn tax_on_sale(&self, amount: f64) -> f64 {
        let taxable = amount.max(0.0) * self.gain_ratio * (1.0 - self.partial_exemption);
        let after_allowance = apply_annual_allowance(taxable, self.allowance_remaining);
        tax_on_realized_gain(
            after_allowance.taxable_after_allowance,
            self.flat_tax_rate,
            self.personal_marginal_rate,
        )
        .tax
    }

    /// Tax on the sale as a share of the amount sold
    #[must_use]
    pub fn effective_rate(&self, amount: f64) -> f64 {
        if amount <= 0.0 {
            0.0
        } else {
            self.tax_on_sale(amount) / amount
        }
    }
}

/// Everything a strategy may look at when sizing one year's withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyContext {
    pub year: i16,
    /// 0 in the first withdrawal year
    pub year_index: u16,
    /// Portfolio at the start of the phase
    pub initial_capital: f64,
    /// Portfolio at the start of this year
    pub current_capital: f64,
    /// Nominal return of the previous year (expected return in the first year)
    pub prior_return: f64,
    /// `(1 + inflation)^year_index`, or 1 without inflation indexing
    pub inflation_factor: f64,
    pub age: Option<u8>,
    pub tax: TaxOutlook,
}

/// Nominal amount to withdraw this year. Never negative and never more
/// than the current capital for capital-relative strategies.
#[must_use]
pub fn compute_withdrawal(config: &StrategyConfig, ctx: &StrategyContext) -> f64 {
    let capital = ctx.current_capital.max(0.0);
    let amount = match config {
        StrategyConfig::FixedRate { rate } => ctx.initial_capital * rate * ctx.inflation_factor,
        StrategyConfig::VariablePercent { rate } => capital * rate,
        StrategyConfig::MonthlyFixed {
            monthly_amount,
            guardrails,
        } => {
            let base = monthly_amount * 12.0 * ctx.inflation_factor;
            match guardrails {
                Some(g) => {
                    let deviation = ctx.prior_return - g.expected_return;
                    if deviation.abs() > g.threshold {
                        base * (1.0 + deviation)
                    } else {
                        base
                    }
                }
                None => base,
            }
        }
        StrategyConfig::Dynamic {
            base_rate,
            upper_threshold,
            upper_adjustment,
            lower_threshold,
            lower_adjustment,
        } => {
            let base = ctx.initial_capital * base_rate * ctx.inflation_factor;
            if ctx.prior_return >= *upper_threshold {
                base * (1.0 + upper_adjustment)
            } else if ctx.prior_return <= *lower_threshold {
                base * (1.0 - lower_adjustment)
            } else {
                base
            }
        }
        StrategyConfig::Bucket { base_rate, .. } => {
            ctx.initial_capital * base_rate * ctx.inflation_factor
        }
        StrategyConfig::CapitalPreservation { inflation_rate } => {
            capital * (ctx.prior_return - inflation_rate)
        }
        StrategyConfig::Rmd { start_age, table } => {
            let age = ctx
                .age
                .unwrap_or_else(|| start_age.saturating_add(ctx.year_index.min(255) as u8))
                .max(*start_age);
            let factor = table.factor(age);
            if factor <= 1.0 { capital } else { capital / factor }
        }
        StrategyConfig::TaxOptimized {
            target_tax_rate,
            min_rate,
            max_rate,
        } => tax_optimized_amount(capital, *target_tax_rate, *min_rate, *max_rate, &ctx.tax),
    };
    amount.max(0.0)
}

/// Largest sale in `[min_rate, max_rate] × capital` whose capital-gains tax
/// stays at or below `target_tax_rate` of the amount sold.
///
/// Bisection to within [`BISECTION_TOLERANCE`] of the upper bound, at most
/// [`BISECTION_MAX_ITERATIONS`] steps. When even the minimum exceeds the
/// target the minimum is withdrawn.
#[must_use]
pub fn tax_optimized_amount(
    capital: f64,
    target_tax_rate: f64,
    min_rate: f64,
    max_rate: f64,
    outlook: &TaxOutlook,
) -> f64 {
    let low = capital * min_rate;
    let high = capital * max_rate;
    maximize_feasible(low, high, BISECTION_TOLERANCE, BISECTION_MAX_ITERATIONS, |amount| {
        outlook.effective_rate(amount) <= target_tax_rate
    })
    .value
}

/// Cash cushion of the bucket strategy, carried from year to year
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketState {
    pub cushion: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketSplit {
    pub from_cushion: f64,
    pub from_portfolio: f64,
}

/// Take `amount` from the cushion first and the rest from the portfolio
#[must_use]
pub fn split_bucket_withdrawal(amount: f64, state: BucketState) -> (BucketSplit, BucketState) {
    let amount = amount.max(0.0);
    let from_cushion = amount.min(state.cushion.max(0.0));
    (
        BucketSplit {
            from_cushion,
            from_portfolio: amount - from_cushion,
        },
        BucketState {
            cushion: state.cushion - from_cushion,
        },
    )
}

/// Transfer into the cushion after a year that grew the portfolio by
/// `year_gain`.
///
/// Only the gain above `refill_threshold` (an amount) counts, of which
/// `refill_percentage` is moved, up to the (inflation-indexed) target size
/// and never more than `available`.
#[must_use]
pub fn bucket_refill(
    refill_threshold: f64,
    refill_percentage: f64,
    target_size: f64,
    year_gain: f64,
    state: BucketState,
    available: f64,
) -> f64 {
    if year_gain <= refill_threshold.max(0.0) {
        return 0.0;
    }
    let excess_gain = year_gain - refill_threshold.max(0.0);
    let room = (target_size - state.cushion).max(0.0);
    (refill_percentage * excess_gain).min(room).min(available.max(0.0)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Guardrails, LifeTable};

    fn ctx(current_capital: f64, prior_return: f64) -> StrategyContext {
        StrategyContext {
            year: 2050,
            year_index: 3,
            initial_capital: 500_000.0,
            current_capital,
            prior_return,
            inflation_factor: 1.0,
            age: Some(70),
            tax: TaxOutlook {
                gain_ratio: 0.5,
                partial_exemption: 0.3,
                flat_tax_rate: 0.26375,
                personal_marginal_rate: None,
                allowance_remaining: 1_000.0,
            },
        }
    }

    #[test]
    fn test_fixed_rate_ignores_performance() {
        let rule = StrategyConfig::FOUR_PERCENT;
        assert_eq!(compute_withdrawal(&rule, &ctx(300_000.0, -0.3)), 20_000.0);
        assert_eq!(compute_withdrawal(&rule, &ctx(900_000.0, 0.25)), 20_000.0);
    }

    #[test]
    fn test_fixed_rate_indexed_by_inflation() {
        let mut context = ctx(500_000.0, 0.05);
        context.inflation_factor = 1.02_f64.powi(3);
        let amount = compute_withdrawal(&StrategyConfig::THREE_PERCENT, &context);
        assert!((amount - 15_000.0 * 1.061_208).abs() < 1e-6);
    }

    #[test]
    fn test_variable_percent_uses_current_capital() {
        let rule = StrategyConfig::VariablePercent { rate: 0.05 };
        assert_eq!(compute_withdrawal(&rule, &ctx(400_000.0, 0.0)), 20_000.0);
    }

    #[test]
    fn test_monthly_guardrails() {
        let rule = StrategyConfig::MonthlyFixed {
            monthly_amount: 2_000.0,
            guardrails: Some(Guardrails {
                expected_return: 0.05,
                threshold: 0.10,
            }),
        };
        assert_eq!(compute_withdrawal(&rule, &ctx(500_000.0, 0.12)), 24_000.0);
        let boom = compute_withdrawal(&rule, &ctx(500_000.0, 0.20));
        assert!((boom - 24_000.0 * 1.15).abs() < 1e-9);
        let crash = compute_withdrawal(&rule, &ctx(500_000.0, -0.25));
        assert!((crash - 24_000.0 * 0.70).abs() < 1e-9);
        assert_eq!(compute_withdrawal(&rule, &ctx(500_000.0, -1.5)), 0.0);
    }

    #[test]
    fn test_dynamic_bands() {
        let rule = StrategyConfig::Dynamic {
            base_rate: 0.04,
            upper_threshold: 0.15,
            upper_adjustment: 0.05,
            lower_threshold: -0.05,
            lower_adjustment: 0.10,
        };
        assert_eq!(compute_withdrawal(&rule, &ctx(500_000.0, 0.02)), 20_000.0);
        assert!((compute_withdrawal(&rule, &ctx(500_000.0, 0.15)) - 21_000.0).abs() < 1e-9);
        assert!((compute_withdrawal(&rule, &ctx(500_000.0, -0.05)) - 18_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_capital_preservation_floors_at_zero() {
        let rule = StrategyConfig::CapitalPreservation {
            inflation_rate: 0.02,
        };
        assert!((compute_withdrawal(&rule, &ctx(100_000.0, 0.07)) - 5_000.0).abs() < 1e-9);
        assert_eq!(compute_withdrawal(&rule, &ctx(100_000.0, -0.10)), 0.0);
    }

    #[test]
    fn test_rmd_divides_by_life_expectancy() {
        let rule = StrategyConfig::Rmd {
            start_age: 65,
            table: LifeTable::german_2020_2022(),
        };
        let amount = compute_withdrawal(&rule, &ctx(155_000.0, 0.0));
        assert!((amount - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_rmd_small_factor_takes_everything() {
        let rule = StrategyConfig::Rmd {
            start_age: 65,
            table: LifeTable {
                entries: vec![crate::model::LifeTableEntry {
                    age: 70,
                    remaining_years: 0.5,
                }],
            },
        };
        assert_eq!(compute_withdrawal(&rule, &ctx(42_000.0, 0.0)), 42_000.0);
    }

    #[test]
    fn test_tax_optimized_stays_within_allowance() {
        // 0.5 gain ratio, 30% exemption: 0.35 of each euro is taxable, so the
        // 1,000 allowance covers sales up to 2,857.14
        let rule = StrategyConfig::TaxOptimized {
            target_tax_rate: 0.0,
            min_rate: 0.0,
            max_rate: 0.10,
        };
        let amount = compute_withdrawal(&rule, &ctx(100_000.0, 0.05));
        assert!((amount - 1_000.0 / 0.35).abs() < 100_000.0 * 0.10 * BISECTION_TOLERANCE);
        assert!(ctx(100_000.0, 0.05).tax.tax_on_sale(amount) <= 1e-9);
    }

    #[test]
    fn test_tax_optimized_hits_max_when_target_loose() {
        let rule = StrategyConfig::TaxOptimized {
            target_tax_rate: 0.30,
            min_rate: 0.02,
            max_rate: 0.06,
        };
        assert!((compute_withdrawal(&rule, &ctx(100_000.0, 0.05)) - 6_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_split_falls_back_to_portfolio() {
        let (split, state) = split_bucket_withdrawal(20_000.0, BucketState { cushion: 15_000.0 });
        assert_eq!(split.from_cushion, 15_000.0);
        assert_eq!(split.from_portfolio, 5_000.0);
        assert_eq!(state.cushion, 0.0);
    }

    #[test]
    fn test_bucket_refill_bounds() {
        let state = BucketState { cushion: 10_000.0 };
        // Gain 40k above a 20k threshold, half of the 20k excess, room 30k
        let refill = bucket_refill(20_000.0, 0.5, 40_000.0, 40_000.0, state, f64::MAX);
        assert!((refill - 10_000.0).abs() < 1e-9);
        // Room limits the refill
        let capped = bucket_refill(20_000.0, 0.5, 15_000.0, 40_000.0, state, f64::MAX);
        assert!((capped - 5_000.0).abs() < 1e-9);
        // Available cash limits the refill
        let short = bucket_refill(20_000.0, 0.5, 40_000.0, 40_000.0, state, 2_500.0);
        assert!((short - 2_500.0).abs() < 1e-9);
        // No refill at or below the threshold, nor in a losing year
        assert_eq!(bucket_refill(20_000.0, 0.5, 40_000.0, 20_000.0, state, f64::MAX), 0.0);
        assert_eq!(bucket_refill(0.0, 0.5, 40_000.0, -30_000.0, state, f64::MAX), 0.0);
    }

    #[test]
    fn test_bucket_refill_threshold_is_an_amount() {
        // 10% on 460k: 46k gain, 41k above a 5k threshold
        let state = BucketState { cushion: 20_000.0 };
        let refill = bucket_refill(5_000.0, 0.5, 40_000.0, 46_000.0, state, f64::MAX);
        assert!((refill - 20_000.0).abs() < 1e-9);
        let refill = bucket_refill(5_000.0, 0.25, 40_000.0, 46_000.0, state, f64::MAX);
        assert!((refill - 10_250.0).abs() < 1e-9);
    }
}

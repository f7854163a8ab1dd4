//! Return and risk statistics of a yearly return series.

use serde::{Deserialize, Serialize};

use crate::model::{AccumulationResult, WithdrawalResult};

/// Display value for ratios without a finite upper bound
pub const UNBOUNDED_RATIO: f64 = 999.0;

/// Below this many observations the 5% VaR is only a rough estimate
pub const ROUGH_ESTIMATE_THRESHOLD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearReturn {
    pub year: i16,
    pub return_rate: f64,
}

/// Statistics of one return series. All rates are fractions.
///
/// Sortino and Calmar are `f64::INFINITY` when there is no downside (no
/// negative year, no drawdown). Call [`PerformanceMetrics::capped`] before
/// handing the values to anything that prints or serializes them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub observations: usize,
    /// Arithmetic sum of the yearly returns
    pub total_return: f64,
    pub average_return: f64,
    /// Geometric mean return
    pub annualized_return: f64,
    /// `∏(1 + r) - 1`
    pub cumulative_return: f64,
    /// Population standard deviation
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    /// Largest peak-to-trough decline of the cumulative path, as a positive
    /// fraction
    pub max_drawdown: f64,
    /// 5th percentile of the yearly returns (historical method)
    pub value_at_risk_5: f64,
    /// Share of years with a return of zero or more
    pub win_rate: f64,
    pub best_year: Option<YearReturn>,
    pub worst_year: Option<YearReturn>,
}

impl PerformanceMetrics {
    /// Copy with unbounded ratios replaced by [`UNBOUNDED_RATIO`]
    #[must_use]
    pub fn capped(&self) -> Self {
        let cap = |ratio: f64| {
            if ratio.is_infinite() && ratio > 0.0 {
                UNBOUNDED_RATIO
            } else {
                ratio
            }
        };
        Self {
            sortino_ratio: cap(self.sortino_ratio),
            calmar_ratio: cap(self.calmar_ratio),
            ..*self
        }
    }

    #[must_use]
    pub fn value_at_risk_is_rough_estimate(&self) -> bool {
        self.observations < ROUGH_ESTIMATE_THRESHOLD
    }
}

/// Compute all statistics for `returns` in chronological order.
/// An empty series yields zeros and no best/worst year.
#[must_use]
pub fn analyze_returns(returns: &[YearReturn]) -> PerformanceMetrics {
    if returns.is_empty() {
        return PerformanceMetrics::default();
    }

    let n = returns.len() as f64;
    let rates: Vec<f64> = returns.iter().map(|r| r.return_rate).collect();

    let total_return: f64 = rates.iter().sum();
    let average_return = total_return / n;
    let volatility = (rates
        .iter()
        .map(|r| (r - average_return).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let growth_product: f64 = rates.iter().map(|r| 1.0 + r).product();
    let cumulative_return = growth_product - 1.0;
    let annualized_return = if growth_product > 0.0 {
        growth_product.powf(1.0 / n) - 1.0
    } else {
        -1.0
    };

    let sharpe_ratio = if volatility > 0.0 {
        average_return / volatility
    } else {
        0.0
    };

    let negatives: Vec<f64> = rates.iter().copied().filter(|r| *r < 0.0).collect();
    let sortino_ratio = if negatives.is_empty() {
        f64::INFINITY
    } else {
        let downside = (negatives.iter().map(|r| r * r).sum::<f64>() / negatives.len() as f64).sqrt();
        average_return / downside
    };

    let max_drawdown = max_drawdown_of_path(&cumulative_path(&rates));
    let calmar_ratio = if max_drawdown > 0.0 {
        annualized_return / max_drawdown
    } else {
        f64::INFINITY
    };

    let wins = rates.iter().filter(|r| **r >= 0.0).count();

    let best_year = returns
        .iter()
        .copied()
        .max_by(|a, b| a.return_rate.total_cmp(&b.return_rate));
    let worst_year = returns
        .iter()
        .copied()
        .min_by(|a, b| a.return_rate.total_cmp(&b.return_rate));

    let mut sorted = rates;
    sorted.sort_by(f64::total_cmp);

    PerformanceMetrics {
        observations: returns.len(),
        total_return,
        average_return,
        annualized_return,
        cumulative_return,
        volatility,
        sharpe_ratio,
        sortino_ratio,
        calmar_ratio,
        max_drawdown,
        value_at_risk_5: percentile(&sorted, 0.05),
        win_rate: wins as f64 / n,
        best_year,
        worst_year,
    }
}

/// Growth of one unit invested, starting at 1.0 before the first year
fn cumulative_path(rates: &[f64]) -> Vec<f64> {
    let mut path = Vec::with_capacity(rates.len() + 1);
    let mut value = 1.0;
    path.push(value);
    for r in rates {
        value *= 1.0 + r;
        path.push(value);
    }
    path
}

/// Largest `(peak - trough) / peak` along `path`, 0 for a path that never
/// falls below an earlier peak
#[must_use]
pub fn max_drawdown_of_path(path: &[f64]) -> f64 {
    let Some(&first) = path.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_drawdown: f64 = 0.0;
    for &value in path {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            max_drawdown = max_drawdown.max((peak - value) / peak);
        }
    }
    max_drawdown
}

/// Nearest-rank percentile of an ascending slice (`p` in 0..=1)
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p * sorted.len() as f64).ceil() as usize).clamp(1, sorted.len());
    sorted[rank - 1]
}

/// Yearly returns of the savings phase, deposits counted as invested capital
#[must_use]
pub fn returns_from_accumulation(result: &AccumulationResult) -> Vec<YearReturn> {
    result
        .years
        .iter()
        .filter_map(|year| {
            let invested = year.starting_capital + year.deposits;
            (invested > 0.0).then(|| YearReturn {
                year: year.year,
                return_rate: (year.ending_capital - year.starting_capital - year.deposits) / invested,
            })
        })
        .collect()
}

/// Market return of every withdrawal year
#[must_use]
pub fn returns_from_withdrawal(result: &WithdrawalResult) -> Vec<YearReturn> {
    result
        .rows
        .iter()
        .map(|row| YearReturn {
            year: row.year,
            return_rate: row.return_rate,
        })
        .collect()
}

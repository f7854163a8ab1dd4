use serde::{Deserialize, Serialize};

use super::life_table::LifeTable;

/// Scale a fixed monthly amount when the prior-year return leaves the band
/// `expected_return ± threshold`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Guardrails {
    pub expected_return: f64,
    pub threshold: f64,
}

/// Withdrawal policy of one run. All rates are fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Fixed share of the capital at the start of the withdrawal phase
    FixedRate { rate: f64 },
    /// Fixed share of the current capital, recomputed every year
    VariablePercent { rate: f64 },
    MonthlyFixed {
        monthly_amount: f64,
        #[serde(default)]
        guardrails: Option<Guardrails>,
    },
    /// Base rate on the initial capital, moved by the prior-year return.
    /// `lower_threshold` may be negative.
    Dynamic {
        base_rate: f64,
        upper_threshold: f64,
        upper_adjustment: f64,
        lower_threshold: f64,
        lower_adjustment: f64,
    },
    /// Withdraw from a cash cushion first and refill it after strong years
    Bucket {
        base_rate: f64,
        /// Target size of the cash cushion
        cushion_size: f64,
        /// Yearly portfolio gain (euros) above which the cushion is refilled
        refill_threshold: f64,
        /// Share of the excess gain moved into the cushion
        refill_percentage: f64,
    },
    /// Withdraw the real return only
    CapitalPreservation { inflation_rate: f64 },
    /// Divide capital by the remaining life expectancy from `start_age` on
    Rmd { start_age: u8, table: LifeTable },
    /// Largest withdrawal whose marginal tax rate stays at or below the target
    TaxOptimized {
        target_tax_rate: f64,
        min_rate: f64,
        max_rate: f64,
    },
}

impl StrategyConfig {
    pub const FOUR_PERCENT: StrategyConfig = StrategyConfig::FixedRate { rate: 0.04 };
    pub const THREE_PERCENT: StrategyConfig = StrategyConfig::FixedRate { rate: 0.03 };

    #[must_use]
    pub fn label(&self) -> String {
        match self {
            StrategyConfig::FixedRate { rate } => format!("{}% rule", percent(*rate)),
            StrategyConfig::VariablePercent { rate } => format!("variable {}%", percent(*rate)),
            StrategyConfig::MonthlyFixed {
                monthly_amount,
                guardrails,
            } => {
                if guardrails.is_some() {
                    format!("monthly {monthly_amount:.0} with guardrails")
                } else {
                    format!("monthly {monthly_amount:.0}")
                }
            }
            StrategyConfig::Dynamic { base_rate, .. } => format!("dynamic {}%", percent(*base_rate)),
            StrategyConfig::Bucket { cushion_size, .. } => format!("bucket ({cushion_size:.0} cushion)"),
            StrategyConfig::CapitalPreservation { .. } => "capital preservation".to_string(),
            StrategyConfig::Rmd { start_age, .. } => format!("RMD from age {start_age}"),
            StrategyConfig::TaxOptimized {
                target_tax_rate, ..
            } => format!("tax-optimized ({}% target)", percent(*target_tax_rate)),
        }
    }

    /// Amount follows inflation when indexing is enabled
    #[must_use]
    pub fn is_inflation_indexed(&self) -> bool {
        matches!(
            self,
            StrategyConfig::FixedRate { .. }
                | StrategyConfig::MonthlyFixed { .. }
                | StrategyConfig::Dynamic { .. }
                | StrategyConfig::Bucket { .. }
        )
    }

    #[must_use]
    pub fn is_bucket(&self) -> bool {
        matches!(self, StrategyConfig::Bucket { .. })
    }
}

/// Rate as a percentage rounded to one decimal, without trailing zeros
fn percent(rate: f64) -> f64 {
    (rate * 1_000.0).round() / 10.0
}

/// A named alternative strategy for the comparison engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonVariant {
    pub name: String,
    pub strategy: StrategyConfig,
}

impl ComparisonVariant {
    #[must_use]
    pub fn new(name: impl Into<String>, strategy: StrategyConfig) -> Self {
        Self {
            name: name.into(),
            strategy,
        }
    }
}

//! Plan configuration
//!
//! [`PlanInput`] is what a form layer or plan file supplies: every field is
//! optional. [`PlanInput::normalize`] fills the gaps from [`defaults`] and
//! yields a fully-populated [`PlanConfig`], and [`PlanConfig::validate`]
//! turns that into a [`ValidatedPlan`] or the complete list of problems.
//! Simulation entry points accept only [`ValidatedPlan`].
//!
//! # Conceptual Organization
//!
//! **World assumptions**: `returns`, `inflation_rate`, `tax`
//!
//! **Savings phase**: `accumulation`
//!
//! **Retirement**: `withdrawal` (strategy, horizon, pension, other income,
//! health insurance) and the `comparison_variants` to weigh against it

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::{
    ComparisonVariant, ContributionElement, HealthInsurance, LifeTable, OtherIncomeSource,
    ReturnProfile, StatutoryPension, StrategyConfig, TaxConfig,
};

pub mod defaults;
mod input;
mod validate;

pub use input::{
    AccumulationInput, ElementInput, HealthInsuranceInput, HorizonInput, LifeTableSource,
    PensionInput, PlanInput, StrategyInput, TaxInput, VariantInput, WithdrawalInput,
};

/// Complete plan configuration with every value resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Market assumption for the savings phase (and the withdrawal phase
    /// unless it has its own)
    pub returns: ReturnProfile,
    /// Seed for stochastic profiles; `None` draws from entropy
    pub seed: Option<u64>,
    pub tax: TaxConfig,
    pub inflation_rate: f64,
    /// `None` for plans that start directly with the withdrawal phase
    pub accumulation: Option<AccumulationConfig>,
    pub withdrawal: WithdrawalConfig,
    pub comparison_variants: Vec<ComparisonVariant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulationConfig {
    pub start_year: i16,
    /// Last savings year (inclusive)
    pub end_year: i16,
    pub elements: Vec<ContributionElement>,
}

/// Where the withdrawal phase ends (inclusive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Horizon {
    EndYear { year: i16 },
    /// Year in which the retiree turns `age`
    EndAge { age: u8 },
    /// Age at the start of the phase plus remaining life expectancy, rounded up
    LifeExpectancy { table: LifeTable },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalConfig {
    pub start_year: i16,
    pub horizon: Horizon,
    pub strategy: StrategyConfig,
    /// Market assumption for the withdrawal phase; `None` continues the
    /// savings-phase profile and random stream
    pub returns: Option<ReturnProfile>,
    /// Capital held outside the savings plans, bought at its current value
    pub initial_capital: f64,
    /// Index fixed amounts with `PlanConfig::inflation_rate`
    pub inflation_adjusted: bool,
    pub birth_year: Option<i16>,
    pub pension: Option<StatutoryPension>,
    pub other_income: Vec<OtherIncomeSource>,
    pub health_insurance: Option<HealthInsurance>,
}

impl WithdrawalConfig {
    /// Age reached in `year`
    #[must_use]
    pub fn age_in(&self, year: i16) -> Option<u8> {
        self.birth_year
            .and_then(|birth| u8::try_from(year - birth).ok())
    }

    /// Last withdrawal year, `None` when the horizon needs a birth year that
    /// is missing
    #[must_use]
    pub fn end_year(&self) -> Option<i16> {
        match &self.horizon {
            Horizon::EndYear { year } => Some(*year),
            Horizon::EndAge { age } => self.birth_year.map(|birth| birth + i16::from(*age)),
            Horizon::LifeExpectancy { table } => {
                let age = self.age_in(self.start_year)?;
                let remaining = table.factor(age).ceil() as i16;
                Some(self.start_year + remaining)
            }
        }
    }
}

impl PlanConfig {
    /// Return profile in effect during the withdrawal phase
    #[must_use]
    pub fn withdrawal_returns(&self) -> &ReturnProfile {
        self.withdrawal.returns.as_ref().unwrap_or(&self.returns)
    }
}

/// A [`PlanConfig`] that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan {
    config: PlanConfig,
    withdrawal_end_year: i16,
}

impl ValidatedPlan {
    #[must_use]
    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    #[must_use]
    pub fn into_inner(self) -> PlanConfig {
        self.config
    }

    /// Resolved last year of the withdrawal phase
    #[must_use]
    pub fn withdrawal_end_year(&self) -> i16 {
        self.withdrawal_end_year
    }
}

impl Deref for ValidatedPlan {
    type Target = PlanConfig;

    fn deref(&self) -> &Self::Target {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn withdrawal(horizon: Horizon, birth_year: Option<i16>) -> WithdrawalConfig {
        WithdrawalConfig {
            start_year: 2050,
            horizon,
            strategy: StrategyConfig::FOUR_PERCENT,
            returns: None,
            initial_capital: 0.0,
            inflation_adjusted: false,
            birth_year,
            pension: None,
            other_income: Vec::new(),
            health_insurance: None,
        }
    }

    #[test]
    fn test_horizon_resolution() {
        assert_eq!(
            withdrawal(Horizon::EndYear { year: 2080 }, None).end_year(),
            Some(2080)
        );
        assert_eq!(
            withdrawal(Horizon::EndAge { age: 90 }, Some(1985)).end_year(),
            Some(2075)
        );
        assert_eq!(withdrawal(Horizon::EndAge { age: 90 }, None).end_year(), None);

        // Age 65 in 2050: 19.1 remaining years, rounded up
        let life = withdrawal(
            Horizon::LifeExpectancy {
                table: LifeTable::german_2020_2022(),
            },
            Some(1985),
        );
        assert_eq!(life.end_year(), Some(2070));
        assert_eq!(life.age_in(2050), Some(65));
    }
}

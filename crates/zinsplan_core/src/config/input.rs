//! Partially-specified plans as supplied by a form or plan file

use std::collections::BTreeMap;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::defaults;
use super::{AccumulationConfig, Horizon, PlanConfig, WithdrawalConfig};
use crate::model::{
    ComparisonVariant, ContributionElement, ContributionKind, ElementId, Guardrails,
    HealthInsurance, IncomeTaxSchedule, LifeTable, LifeTableEntry, OtherIncomeSource,
    ReturnProfile, StatutoryPension, StrategyConfig, TaxConfig,
};
use crate::taxes::{flat_tax_rate, pension_taxable_percentage_for_start_year};

/// A plan with optional fields. Rates are fractions (`0.04` for 4%).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanInput {
    pub returns: Option<ReturnProfile>,
    pub seed: Option<u64>,
    pub inflation_rate: Option<f64>,
    pub tax: Option<TaxInput>,
    pub accumulation: Option<AccumulationInput>,
    pub withdrawal: Option<WithdrawalInput>,
    pub comparison: Vec<VariantInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxInput {
    /// Overrides the rate derived from `church_tax_rate`
    pub flat_tax_rate: Option<f64>,
    /// Kirchensteuer, 0.08 or 0.09 depending on the state
    pub church_tax_rate: Option<f64>,
    pub partial_exemption: Option<f64>,
    pub annual_allowance: Option<f64>,
    pub allowance_by_year: BTreeMap<i16, f64>,
    pub base_rate: Option<f64>,
    pub base_rate_by_year: BTreeMap<i16, f64>,
    /// Enables the Günstigerprüfung
    pub personal_marginal_rate: Option<f64>,
    pub basic_allowance: Option<f64>,
    pub income_tax_schedule: Option<IncomeTaxSchedule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulationInput {
    pub start_year: Option<i16>,
    pub end_year: Option<i16>,
    pub elements: Vec<ElementInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInput {
    #[serde(default)]
    pub name: Option<String>,
    pub kind: ContributionKind,
    pub start: Date,
    #[serde(default)]
    pub end: Option<Date>,
    #[serde(default)]
    pub annual_cost_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WithdrawalInput {
    pub start_year: Option<i16>,
    pub horizon: Option<HorizonInput>,
    pub birth_year: Option<i16>,
    pub strategy: Option<StrategyInput>,
    pub returns: Option<ReturnProfile>,
    pub initial_capital: Option<f64>,
    pub inflation_adjusted: Option<bool>,
    pub pension: Option<PensionInput>,
    pub other_income: Vec<OtherIncomeSource>,
    pub health_insurance: Option<HealthInsuranceInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HorizonInput {
    EndYear { year: i16 },
    EndAge { age: Option<u8> },
    LifeExpectancy { life_table: Option<LifeTableSource> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifeTableSource {
    /// Bundled German period table 2020/2022
    German,
    Custom { entries: Vec<LifeTableEntry> },
}

impl LifeTableSource {
    fn resolve(self) -> LifeTable {
        match self {
            LifeTableSource::German => LifeTable::german_2020_2022(),
            LifeTableSource::Custom { entries } => LifeTable { entries },
        }
    }
}

fn life_table(source: Option<LifeTableSource>) -> LifeTable {
    source.map_or_else(LifeTable::german_2020_2022, LifeTableSource::resolve)
}

/// Strategy selector with optional parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyInput {
    FourPercent,
    ThreePercent,
    FixedRate {
        rate: Option<f64>,
    },
    VariablePercent {
        rate: Option<f64>,
    },
    MonthlyFixed {
        monthly_amount: Option<f64>,
        guardrails: Option<bool>,
        guardrails_threshold: Option<f64>,
    },
    Dynamic {
        base_rate: Option<f64>,
        upper_threshold: Option<f64>,
        upper_adjustment: Option<f64>,
        lower_threshold: Option<f64>,
        lower_adjustment: Option<f64>,
    },
    Bucket {
        base_rate: Option<f64>,
        cushion_size: Option<f64>,
        refill_threshold: Option<f64>,
        refill_percentage: Option<f64>,
    },
    CapitalPreservation {
        inflation_rate: Option<f64>,
    },
    Rmd {
        start_age: Option<u8>,
        life_table: Option<LifeTableSource>,
    },
    TaxOptimized {
        target_tax_rate: Option<f64>,
        min_rate: Option<f64>,
        max_rate: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantInput {
    #[serde(default)]
    pub name: Option<String>,
    pub strategy: StrategyInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PensionInput {
    /// Defaults to the first withdrawal year
    #[serde(default)]
    pub start_year: Option<i16>,
    pub monthly_gross: f64,
    #[serde(default)]
    pub annual_increase: Option<f64>,
    /// Percent; derived from the start-year cohort when absent
    #[serde(default)]
    pub taxable_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HealthInsuranceInput {
    Statutory {
        health_rate: Option<f64>,
        additional_rate: Option<f64>,
        care_rate: Option<f64>,
        childless: Option<bool>,
        pension_insurer_share: Option<bool>,
        annual_contribution_ceiling: Option<f64>,
    },
    Private {
        monthly_health: f64,
        monthly_care: f64,
        annual_increase: Option<f64>,
    },
}

/// Context the strategy defaults depend on
struct StrategyDefaults {
    expected_return: f64,
    inflation_rate: f64,
}

impl StrategyInput {
    fn normalize(self, d: &StrategyDefaults) -> StrategyConfig {
        use defaults::*;

        match self {
            StrategyInput::FourPercent => StrategyConfig::FOUR_PERCENT,
            StrategyInput::ThreePercent => StrategyConfig::THREE_PERCENT,
            StrategyInput::FixedRate { rate } => StrategyConfig::FixedRate {
                rate: rate.unwrap_or(BASE_WITHDRAWAL_RATE),
            },
            StrategyInput::VariablePercent { rate } => StrategyConfig::VariablePercent {
                rate: rate.unwrap_or(BASE_WITHDRAWAL_RATE),
            },
            StrategyInput::MonthlyFixed {
                monthly_amount,
                guardrails,
                guardrails_threshold,
            } => StrategyConfig::MonthlyFixed {
                monthly_amount: monthly_amount.unwrap_or(MONTHLY_WITHDRAWAL),
                guardrails: guardrails.unwrap_or(false).then(|| Guardrails {
                    expected_return: d.expected_return,
                    threshold: guardrails_threshold.unwrap_or(GUARDRAILS_THRESHOLD),
                }),
            },
            StrategyInput::Dynamic {
                base_rate,
                upper_threshold,
                upper_adjustment,
                lower_threshold,
                lower_adjustment,
            } => StrategyConfig::Dynamic {
                base_rate: base_rate.unwrap_or(BASE_WITHDRAWAL_RATE),
                upper_threshold: upper_threshold.unwrap_or(DYNAMIC_UPPER_THRESHOLD),
                upper_adjustment: upper_adjustment.unwrap_or(DYNAMIC_UPPER_ADJUSTMENT),
                lower_threshold: lower_threshold.unwrap_or(DYNAMIC_LOWER_THRESHOLD),
                lower_adjustment: lower_adjustment.unwrap_or(DYNAMIC_LOWER_ADJUSTMENT),
            },
            StrategyInput::Bucket {
                base_rate,
                cushion_size,
                refill_threshold,
                refill_percentage,
            } => StrategyConfig::Bucket {
                base_rate: base_rate.unwrap_or(BASE_WITHDRAWAL_RATE),
                cushion_size: cushion_size.unwrap_or(BUCKET_CUSHION_SIZE),
                refill_threshold: refill_threshold.unwrap_or(BUCKET_REFILL_THRESHOLD),
                refill_percentage: refill_percentage.unwrap_or(BUCKET_REFILL_PERCENTAGE),
            },
            StrategyInput::CapitalPreservation { inflation_rate } => {
                StrategyConfig::CapitalPreservation {
                    inflation_rate: inflation_rate.unwrap_or(d.inflation_rate),
                }
            }
            StrategyInput::Rmd {
                start_age,
                life_table: source,
            } => StrategyConfig::Rmd {
                start_age: start_age.unwrap_or(RMD_START_AGE),
                table: life_table(source),
            },
            StrategyInput::TaxOptimized {
                target_tax_rate,
                min_rate,
                max_rate,
            } => StrategyConfig::TaxOptimized {
                target_tax_rate: target_tax_rate.unwrap_or(TAX_OPTIMIZED_TARGET_RATE),
                min_rate: min_rate.unwrap_or(TAX_OPTIMIZED_MIN_RATE),
                max_rate: max_rate.unwrap_or(TAX_OPTIMIZED_MAX_RATE),
            },
        }
    }
}

impl TaxInput {
    fn normalize(self) -> TaxConfig {
        let church_tax_rate = self.church_tax_rate.unwrap_or(0.0);
        TaxConfig {
            flat_tax_rate: self
                .flat_tax_rate
                .unwrap_or_else(|| flat_tax_rate(church_tax_rate)),
            partial_exemption: self.partial_exemption.unwrap_or(defaults::PARTIAL_EXEMPTION),
            annual_allowance: self.annual_allowance.unwrap_or(defaults::ANNUAL_ALLOWANCE),
            allowance_by_year: self.allowance_by_year,
            base_rate: self.base_rate.unwrap_or(defaults::BASE_RATE),
            base_rate_by_year: self.base_rate_by_year,
            personal_marginal_rate: self.personal_marginal_rate,
            basic_allowance: self.basic_allowance.unwrap_or(defaults::BASIC_ALLOWANCE),
            income_tax_schedule: self
                .income_tax_schedule
                .unwrap_or(IncomeTaxSchedule::Progressive2024),
        }
    }
}

impl HealthInsuranceInput {
    fn normalize(self) -> HealthInsurance {
        match self {
            HealthInsuranceInput::Statutory {
                health_rate,
                additional_rate,
                care_rate,
                childless,
                pension_insurer_share,
                annual_contribution_ceiling,
            } => HealthInsurance::Statutory {
                health_rate: health_rate.unwrap_or(defaults::HEALTH_RATE),
                additional_rate: additional_rate.unwrap_or(defaults::HEALTH_ADDITIONAL_RATE),
                care_rate: care_rate.unwrap_or(defaults::CARE_RATE),
                childless_surcharge: if childless.unwrap_or(false) {
                    defaults::CARE_CHILDLESS_SURCHARGE
                } else {
                    0.0
                },
                pension_insurer_share: pension_insurer_share.unwrap_or(true),
                annual_contribution_ceiling: annual_contribution_ceiling
                    .unwrap_or(defaults::HEALTH_CONTRIBUTION_CEILING),
            },
            HealthInsuranceInput::Private {
                monthly_health,
                monthly_care,
                annual_increase,
            } => HealthInsurance::Private {
                monthly_health,
                monthly_care,
                annual_increase: annual_increase.unwrap_or(defaults::PRIVATE_PREMIUM_INCREASE),
            },
        }
    }
}

impl PlanInput {
    /// Fill every missing value from [`defaults`]. Never fails; range and
    /// consistency checks happen in [`PlanConfig::validate`].
    #[must_use]
    pub fn normalize(self) -> PlanConfig {
        let returns = self.returns.unwrap_or(ReturnProfile::Fixed {
            rate: defaults::FIXED_RETURN,
        });
        let inflation_rate = self.inflation_rate.unwrap_or(defaults::INFLATION_RATE);
        let tax = self.tax.unwrap_or_default().normalize();
        let current_year = jiff::Zoned::now().year();

        let accumulation = self.accumulation.map(|acc| {
            let start_year = acc.start_year.unwrap_or(current_year);
            let elements = acc
                .elements
                .into_iter()
                .enumerate()
                .map(|(idx, element)| ContributionElement {
                    id: ElementId(idx as u16),
                    name: element.name.unwrap_or_else(|| format!("Element {}", idx + 1)),
                    kind: element.kind,
                    start: element.start,
                    end: element.end,
                    annual_cost_rate: element.annual_cost_rate.unwrap_or(0.0),
                    ledger: Default::default(),
                })
                .collect();
            AccumulationConfig {
                start_year,
                end_year: acc
                    .end_year
                    .unwrap_or(start_year + defaults::ACCUMULATION_YEARS - 1),
                elements,
            }
        });

        let input = self.withdrawal.unwrap_or_default();
        let start_year = input.start_year.unwrap_or_else(|| {
            accumulation
                .as_ref()
                .map_or(current_year, |acc| acc.end_year + 1)
        });
        let withdrawal_returns = input.returns;
        let strategy_defaults = StrategyDefaults {
            expected_return: withdrawal_returns
                .as_ref()
                .unwrap_or(&returns)
                .expected_return(),
            inflation_rate,
        };

        let horizon = match input.horizon {
            Some(HorizonInput::EndYear { year }) => Horizon::EndYear { year },
            Some(HorizonInput::EndAge { age }) => Horizon::EndAge {
                age: age.unwrap_or(defaults::LIFE_EXPECTANCY_END_AGE),
            },
            Some(HorizonInput::LifeExpectancy { life_table: source }) => {
                Horizon::LifeExpectancy {
                    table: life_table(source),
                }
            }
            None if input.birth_year.is_some() => Horizon::EndAge {
                age: defaults::LIFE_EXPECTANCY_END_AGE,
            },
            None => Horizon::EndYear {
                year: start_year + defaults::WITHDRAWAL_YEARS - 1,
            },
        };

        let pension = input.pension.map(|p| {
            let pension_start = p.start_year.unwrap_or(start_year);
            StatutoryPension {
                start_year: pension_start,
                monthly_gross: p.monthly_gross,
                annual_increase: p
                    .annual_increase
                    .unwrap_or(defaults::PENSION_ANNUAL_INCREASE),
                taxable_percentage: p
                    .taxable_percentage
                    .unwrap_or_else(|| pension_taxable_percentage_for_start_year(pension_start)),
            }
        });

        let strategy = input
            .strategy
            .unwrap_or(StrategyInput::FourPercent)
            .normalize(&strategy_defaults);

        let comparison_variants = self
            .comparison
            .into_iter()
            .map(|variant| {
                let strategy = variant.strategy.normalize(&strategy_defaults);
                let name = variant.name.unwrap_or_else(|| strategy.label());
                ComparisonVariant::new(name, strategy)
            })
            .collect();

        PlanConfig {
            returns,
            seed: self.seed,
            tax,
            inflation_rate,
            accumulation,
            withdrawal: WithdrawalConfig {
                start_year,
                horizon,
                strategy,
                returns: withdrawal_returns,
                initial_capital: input.initial_capital.unwrap_or(0.0),
                inflation_adjusted: input.inflation_adjusted.unwrap_or(false),
                birth_year: input.birth_year,
                pension,
                other_income: input.other_income,
                health_insurance: input.health_insurance.map(HealthInsuranceInput::normalize),
            },
            comparison_variants,
        }
    }
}

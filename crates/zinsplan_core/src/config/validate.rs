//! Range and consistency checks at the configuration boundary
//!
//! Every problem is collected; nothing is clamped. The simulators rely on
//! these checks and do not repeat them.

use super::{Horizon, PlanConfig, ValidatedPlan, WithdrawalConfig};
use crate::error::ValidationErrors;
use crate::model::{
    ContributionKind, HealthInsurance, IncomeTaxSchedule, LifeTable, ReturnProfile,
    StrategyConfig, TaxConfig,
};

/// Allowed deviation of blended weights from 100%
const WEIGHT_TOLERANCE: f64 = 1e-4;

fn non_negative(errors: &mut ValidationErrors, field: &str, value: f64) {
    if !value.is_finite() {
        errors.push(field, "must be a finite number");
    } else if value < 0.0 {
        errors.push(field, format!("must not be negative (got {value})"));
    }
}

/// A share between 0% and 100%
fn fraction(errors: &mut ValidationErrors, field: &str, value: f64) {
    non_negative(errors, field, value);
    if value > 1.0 {
        errors.push(field, format!("must not exceed 100% (got {}%)", value * 100.0));
    }
}

/// A return or rate that may be negative but not below -100%
fn rate(errors: &mut ValidationErrors, field: &str, value: f64) {
    if !value.is_finite() {
        errors.push(field, "must be a finite number");
    } else if value < -1.0 {
        errors.push(field, format!("must not be below -100% (got {}%)", value * 100.0));
    }
}

fn life_table(errors: &mut ValidationErrors, field: &str, table: &LifeTable) {
    if !table.is_well_formed() {
        errors.push(
            field,
            "must list strictly increasing ages with positive remaining years",
        );
    }
}

pub(super) fn validate_returns(errors: &mut ValidationErrors, field: &str, profile: &ReturnProfile) {
    match profile {
        ReturnProfile::Fixed { rate: r } => rate(errors, &format!("{field}.rate"), *r),
        ReturnProfile::Variable {
            rates,
            default_rate,
        } => {
            rate(errors, &format!("{field}.default_rate"), *default_rate);
            for (year, r) in rates {
                rate(errors, &format!("{field}.rates.{year}"), *r);
            }
        }
        ReturnProfile::Random { mean, std_dev } | ReturnProfile::LogNormal { mean, std_dev } => {
            rate(errors, &format!("{field}.mean"), *mean);
            non_negative(errors, &format!("{field}.std_dev"), *std_dev);
        }
        ReturnProfile::StudentT { mean, scale, df } => {
            rate(errors, &format!("{field}.mean"), *mean);
            non_negative(errors, &format!("{field}.scale"), *scale);
            if !(*df > 0.0) {
                errors.push(format!("{field}.df"), "degrees of freedom must be positive");
            }
        }
        ReturnProfile::Historical { index, start_year } => {
            if !index.covers(*start_year) {
                errors.push(
                    format!("{field}.start_year"),
                    format!(
                        "{} data covers {} to {}",
                        index.name(),
                        index.first_year(),
                        index.last_year()
                    ),
                );
            }
        }
        ReturnProfile::Bootstrap { block_size, .. } => {
            if *block_size == 0 {
                errors.push(format!("{field}.block_size"), "must be at least 1");
            }
        }
        ReturnProfile::Blended { components } => {
            if components.is_empty() {
                errors.push(format!("{field}.components"), "must not be empty");
            }
            let mut total = 0.0;
            for (idx, component) in components.iter().enumerate() {
                let path = format!("{field}.components[{idx}]");
                fraction(errors, &format!("{path}.weight"), component.weight);
                total += component.weight;
                validate_returns(errors, &format!("{path}.profile"), &component.profile);
            }
            if !components.is_empty() && (total - 1.0).abs() > WEIGHT_TOLERANCE {
                errors.push(
                    format!("{field}.components"),
                    format!("weights must sum to 100% (got {:.2}%)", total * 100.0),
                );
            }
        }
    }
}

fn validate_tax(errors: &mut ValidationErrors, tax: &TaxConfig) {
    fraction(errors, "tax.flat_tax_rate", tax.flat_tax_rate);
    fraction(errors, "tax.partial_exemption", tax.partial_exemption);
    non_negative(errors, "tax.annual_allowance", tax.annual_allowance);
    for (year, allowance) in &tax.allowance_by_year {
        non_negative(errors, &format!("tax.allowance_by_year.{year}"), *allowance);
    }
    // The Basiszins was negative in 2021, so only the -100% floor applies
    rate(errors, "tax.base_rate", tax.base_rate);
    for (year, base_rate) in &tax.base_rate_by_year {
        rate(errors, &format!("tax.base_rate_by_year.{year}"), *base_rate);
    }
    if let Some(personal) = tax.personal_marginal_rate {
        fraction(errors, "tax.personal_marginal_rate", personal);
    }
    non_negative(errors, "tax.basic_allowance", tax.basic_allowance);
    if let IncomeTaxSchedule::Flat { rate: r } = tax.income_tax_schedule {
        fraction(errors, "tax.income_tax_schedule.rate", r);
    }
}

pub(super) fn validate_strategy(
    errors: &mut ValidationErrors,
    field: &str,
    strategy: &StrategyConfig,
    birth_year: Option<i16>,
) {
    let path = |name: &str| format!("{field}.{name}");
    match strategy {
        StrategyConfig::FixedRate { rate: r } | StrategyConfig::VariablePercent { rate: r } => {
            fraction(errors, &path("rate"), *r);
        }
        StrategyConfig::MonthlyFixed {
            monthly_amount,
            guardrails,
        } => {
            non_negative(errors, &path("monthly_amount"), *monthly_amount);
            if let Some(g) = guardrails {
                rate(errors, &path("guardrails.expected_return"), g.expected_return);
                non_negative(errors, &path("guardrails.threshold"), g.threshold);
            }
        }
        StrategyConfig::Dynamic {
            base_rate,
            upper_threshold,
            upper_adjustment,
            lower_threshold,
            lower_adjustment,
        } => {
            fraction(errors, &path("base_rate"), *base_rate);
            rate(errors, &path("upper_threshold"), *upper_threshold);
            rate(errors, &path("lower_threshold"), *lower_threshold);
            fraction(errors, &path("upper_adjustment"), *upper_adjustment);
            fraction(errors, &path("lower_adjustment"), *lower_adjustment);
            if lower_threshold > upper_threshold {
                errors.push(
                    path("lower_threshold"),
                    "must not be above the upper threshold",
                );
            }
        }
        StrategyConfig::Bucket {
            base_rate,
            cushion_size,
            refill_threshold,
            refill_percentage,
        } => {
            fraction(errors, &path("base_rate"), *base_rate);
            non_negative(errors, &path("cushion_size"), *cushion_size);
            non_negative(errors, &path("refill_threshold"), *refill_threshold);
            fraction(errors, &path("refill_percentage"), *refill_percentage);
        }
        StrategyConfig::CapitalPreservation { inflation_rate } => {
            fraction(errors, &path("inflation_rate"), *inflation_rate);
        }
        StrategyConfig::Rmd { start_age, table } => {
            life_table(errors, &path("table"), table);
            if let (Some(first), Some(last)) = (table.first_age(), table.last_age())
                && !(first..=last).contains(start_age)
            {
                errors.push(
                    path("start_age"),
                    format!("must lie within the life table ({first} to {last})"),
                );
            }
            if birth_year.is_none() {
                errors.push("withdrawal.birth_year", "required by the RMD strategy");
            }
        }
        StrategyConfig::TaxOptimized {
            target_tax_rate,
            min_rate,
            max_rate,
        } => {
            fraction(errors, &path("target_tax_rate"), *target_tax_rate);
            fraction(errors, &path("min_rate"), *min_rate);
            fraction(errors, &path("max_rate"), *max_rate);
            if min_rate > max_rate {
                errors.push(path("min_rate"), "must not be above max_rate");
            }
        }
    }
}

fn validate_withdrawal(
    errors: &mut ValidationErrors,
    withdrawal: &WithdrawalConfig,
    has_accumulation: bool,
) -> Option<i16> {
    non_negative(errors, "withdrawal.initial_capital", withdrawal.initial_capital);
    if !has_accumulation && withdrawal.initial_capital <= 0.0 {
        errors.push(
            "withdrawal.initial_capital",
            "required when the plan has no accumulation phase",
        );
    }
    if let Some(returns) = &withdrawal.returns {
        validate_returns(errors, "withdrawal.returns", returns);
    }

    match &withdrawal.horizon {
        Horizon::EndAge { .. } if withdrawal.birth_year.is_none() => {
            errors.push("withdrawal.birth_year", "required by an end-age horizon");
        }
        Horizon::LifeExpectancy { table } => {
            life_table(errors, "withdrawal.horizon.table", table);
            if withdrawal.age_in(withdrawal.start_year).is_none() {
                errors.push(
                    "withdrawal.birth_year",
                    "required by a life-expectancy horizon (and must precede the start year)",
                );
            }
        }
        _ => {}
    }
    let end_year = withdrawal.end_year();
    if let Some(end) = end_year
        && end < withdrawal.start_year
    {
        errors.push(
            "withdrawal.horizon",
            format!(
                "ends in {end}, before the withdrawal start in {}",
                withdrawal.start_year
            ),
        );
    }

    validate_strategy(
        errors,
        "withdrawal.strategy",
        &withdrawal.strategy,
        withdrawal.birth_year,
    );

    if let Some(pension) = &withdrawal.pension {
        non_negative(errors, "withdrawal.pension.monthly_gross", pension.monthly_gross);
        rate(errors, "withdrawal.pension.annual_increase", pension.annual_increase);
        non_negative(
            errors,
            "withdrawal.pension.taxable_percentage",
            pension.taxable_percentage,
        );
        if pension.taxable_percentage > 100.0 {
            errors.push(
                "withdrawal.pension.taxable_percentage",
                format!("must not exceed 100 (got {})", pension.taxable_percentage),
            );
        }
    }

    for (idx, source) in withdrawal.other_income.iter().enumerate() {
        let path = format!("withdrawal.other_income[{idx}]");
        non_negative(errors, &format!("{path}.monthly_amount"), source.monthly_amount);
        fraction(errors, &format!("{path}.tax_rate"), source.tax_rate);
        if let Some(end) = source.end_year
            && end < source.start_year
        {
            errors.push(format!("{path}.end_year"), "must not be before start_year");
        }
    }

    match &withdrawal.health_insurance {
        Some(HealthInsurance::Statutory {
            health_rate,
            additional_rate,
            care_rate,
            childless_surcharge,
            annual_contribution_ceiling,
            ..
        }) => {
            let path = "withdrawal.health_insurance";
            fraction(errors, &format!("{path}.health_rate"), *health_rate);
            fraction(errors, &format!("{path}.additional_rate"), *additional_rate);
            fraction(errors, &format!("{path}.care_rate"), *care_rate);
            fraction(errors, &format!("{path}.childless_surcharge"), *childless_surcharge);
            non_negative(
                errors,
                &format!("{path}.annual_contribution_ceiling"),
                *annual_contribution_ceiling,
            );
        }
        Some(HealthInsurance::Private {
            monthly_health,
            monthly_care,
            annual_increase,
        }) => {
            let path = "withdrawal.health_insurance";
            non_negative(errors, &format!("{path}.monthly_health"), *monthly_health);
            non_negative(errors, &format!("{path}.monthly_care"), *monthly_care);
            rate(errors, &format!("{path}.annual_increase"), *annual_increase);
        }
        None => {}
    }

    end_year
}

impl PlanConfig {
    /// Check every field; returns all problems found, not just the first
    pub fn validate(self) -> Result<ValidatedPlan, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        validate_returns(&mut errors, "returns", &self.returns);
        if self.inflation_rate < 0.0 || self.inflation_rate > 1.0 || !self.inflation_rate.is_finite() {
            errors.push("inflation_rate", "must lie between 0% and 100%");
        }
        validate_tax(&mut errors, &self.tax);

        if let Some(acc) = &self.accumulation {
            if acc.end_year < acc.start_year {
                errors.push(
                    "accumulation.end_year",
                    format!("{} is before the start year {}", acc.end_year, acc.start_year),
                );
            }
            if self.withdrawal.start_year <= acc.end_year {
                errors.push(
                    "withdrawal.start_year",
                    format!(
                        "must be after the last savings year {} (got {})",
                        acc.end_year, self.withdrawal.start_year
                    ),
                );
            }
            for (idx, element) in acc.elements.iter().enumerate() {
                let path = format!("accumulation.elements[{idx}]");
                match element.kind {
                    ContributionKind::SavingsPlan { annual_amount, .. } => {
                        non_negative(&mut errors, &format!("{path}.kind.annual_amount"), annual_amount);
                    }
                    ContributionKind::LumpSum { amount } => {
                        non_negative(&mut errors, &format!("{path}.kind.amount"), amount);
                    }
                }
                fraction(&mut errors, &format!("{path}.annual_cost_rate"), element.annual_cost_rate);
                if let Some(end) = element.end
                    && end < element.start
                {
                    errors.push(format!("{path}.end"), "must not be before the start date");
                }
                let year = element.start.year();
                if year < acc.start_year || year > acc.end_year {
                    errors.push(
                        format!("{path}.start"),
                        format!(
                            "must fall within the savings years {} to {}",
                            acc.start_year, acc.end_year
                        ),
                    );
                }
            }
        }

        let end_year = validate_withdrawal(
            &mut errors,
            &self.withdrawal,
            self.accumulation.is_some(),
        );

        for (idx, variant) in self.comparison_variants.iter().enumerate() {
            if variant.name.trim().is_empty() {
                errors.push(format!("comparison[{idx}].name"), "must not be empty");
            }
            validate_strategy(
                &mut errors,
                &format!("comparison[{idx}].strategy"),
                &variant.strategy,
                self.withdrawal.birth_year,
            );
        }

        match end_year {
            Some(withdrawal_end_year) if errors.is_empty() => Ok(ValidatedPlan {
                config: self,
                withdrawal_end_year,
            }),
            _ => Err(errors),
        }
    }
}

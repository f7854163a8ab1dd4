//! German tax rules for fund savings and retirement income
//!
//! - [`capital_gains`]: Vorabpauschale, Sparerpauschbetrag, Teilfreistellung
//!   and Günstigerprüfung
//! - [`income`]: §32a income tax with Grundfreibetrag, pension cohorts and
//!   other income
//! - [`health`]: statutory and private health/care insurance

pub mod capital_gains;
pub mod health;
pub mod income;

pub use capital_gains::{
    ADVANCE_LUMP_SUM_FACTOR, AdvanceLumpSum, AllowanceApplication, AllowancePool,
    FavorabilityOutcome, TaxRegime, advance_lump_sum_tax, apply_annual_allowance,
    favorability_check, flat_tax_rate, gain_ratio, realized_gain, tax_on_realized_gain,
};
pub use health::{HealthInsuranceYear, health_insurance_contributions};
pub use income::{
    GRUNDFREIBETRAG_2024, IncomeTaxResult, OtherIncomeYear, PensionYear, german_income_tax_2024,
    income_tax_with_basic_allowance, other_income_for_year,
    pension_taxable_percentage_for_start_year, statutory_pension_taxable_portion,
};

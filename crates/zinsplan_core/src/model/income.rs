//! Income that flows alongside portfolio withdrawals: statutory pension,
//! other recurring income and health/care insurance.

use serde::{Deserialize, Serialize};

/// Gesetzliche Rente
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatutoryPension {
    pub start_year: i16,
    /// Gross monthly pension in the start year
    pub monthly_gross: f64,
    /// Yearly pension adjustment (fraction)
    pub annual_increase: f64,
    /// Besteuerungsanteil in percent, fixed by the start-year cohort
    pub taxable_percentage: f64,
}

impl StatutoryPension {
    /// Gross annual pension paid in `year` (0 before the start year)
    #[must_use]
    pub fn gross_for_year(&self, year: i16) -> f64 {
        if year < self.start_year {
            return 0.0;
        }
        let years = i32::from(year - self.start_year);
        self.monthly_gross * 12.0 * (1.0 + self.annual_increase).powi(years)
    }
}

/// Recurring income other than the statutory pension (rent, company pension, part-time work)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherIncomeSource {
    pub name: String,
    pub monthly_amount: f64,
    /// Gross amounts are taxed at `tax_rate`; net amounts are paid out as is
    pub amount_is_gross: bool,
    pub tax_rate: f64,
    pub start_year: i16,
    #[serde(default)]
    pub end_year: Option<i16>,
    /// Index the amount with inflation from `start_year`
    pub inflation_adjusted: bool,
}

impl OtherIncomeSource {
    #[must_use]
    pub fn is_active(&self, year: i16) -> bool {
        year >= self.start_year && self.end_year.is_none_or(|end| year <= end)
    }

    /// Annual amount in `year` as configured (gross or net)
    #[must_use]
    pub fn annual_amount(&self, year: i16, inflation_rate: f64) -> f64 {
        if !self.is_active(year) {
            return 0.0;
        }
        let base = self.monthly_amount * 12.0;
        if self.inflation_adjusted {
            base * (1.0 + inflation_rate).powi(i32::from(year - self.start_year))
        } else {
            base
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceType {
    Statutory,
    Private,
}

/// Kranken- und Pflegeversicherung in retirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HealthInsurance {
    /// Contributions levied on pension and other income
    Statutory {
        /// General health rate, e.g. 0.146
        health_rate: f64,
        /// Zusatzbeitrag of the insurer
        additional_rate: f64,
        /// Care insurance rate, e.g. 0.034
        care_rate: f64,
        /// Surcharge for childless members, e.g. 0.006
        childless_surcharge: f64,
        /// Pension insurer pays half of the health contribution on the pension
        pension_insurer_share: bool,
        /// Beitragsbemessungsgrenze per year
        annual_contribution_ceiling: f64,
    },
    /// Fixed premiums growing by `annual_increase` each year
    Private {
        monthly_health: f64,
        monthly_care: f64,
        annual_increase: f64,
    },
}

impl HealthInsurance {
    #[must_use]
    pub fn insurance_type(&self) -> InsuranceType {
        match self {
            HealthInsurance::Statutory { .. } => InsuranceType::Statutory,
            HealthInsurance::Private { .. } => InsuranceType::Private,
        }
    }
}

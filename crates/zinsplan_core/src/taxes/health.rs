//! Health and care insurance contributions during retirement

use serde::{Deserialize, Serialize};

use crate::model::{HealthInsurance, InsuranceType};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthInsuranceYear {
    pub health_annual: f64,
    pub care_annual: f64,
    pub health_monthly: f64,
    pub care_monthly: f64,
    pub insurance_type: InsuranceType,
}

impl HealthInsuranceYear {
    #[must_use]
    pub fn total_annual(&self) -> f64 {
        self.health_annual + self.care_annual
    }
}

/// Contributions owed in a year.
///
/// Statutory contributions are levied on pension and other gross income up to
/// the contribution ceiling, the pension first. Portfolio withdrawals are not
/// contribution-liable. Private premiums grow by their increase rate for
/// every year elapsed since the start of withdrawals.
#[must_use]
pub fn health_insurance_contributions(
    insurance: &HealthInsurance,
    pension_gross: f64,
    other_income_gross: f64,
    years_elapsed: u16,
) -> HealthInsuranceYear {
    let (health_annual, care_annual) = match *insurance {
        HealthInsurance::Statutory {
            health_rate,
            additional_rate,
            care_rate,
            childless_surcharge,
            pension_insurer_share,
            annual_contribution_ceiling,
        } => {
            let ceiling = annual_contribution_ceiling.max(0.0);
            let pension_base = pension_gross.max(0.0).min(ceiling);
            let other_base = other_income_gross.max(0.0).min(ceiling - pension_base);
            let health_total_rate = health_rate + additional_rate;
            let member_share = if pension_insurer_share { 0.5 } else { 1.0 };
            let health = pension_base * health_total_rate * member_share + other_base * health_total_rate;
            let care = (pension_base + other_base) * (care_rate + childless_surcharge);
            (health, care)
        }
        HealthInsurance::Private {
            monthly_health,
            monthly_care,
            annual_increase,
        } => {
            let growth = (1.0 + annual_increase).powi(i32::from(years_elapsed));
            (monthly_health * 12.0 * growth, monthly_care * 12.0 * growth)
        }
    };

    HealthInsuranceYear {
        health_annual,
        care_annual,
        health_monthly: health_annual / 12.0,
        care_monthly: care_annual / 12.0,
        insurance_type: insurance.insurance_type(),
    }
}

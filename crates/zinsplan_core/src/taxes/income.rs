//! Income tax with Grundfreibetrag, pension taxation and tax on other income

use serde::{Deserialize, Serialize};

use crate::model::{IncomeTaxSchedule, OtherIncomeSource, StatutoryPension};

/// Grundfreibetrag built into the 2024 §32a zones
pub const GRUNDFREIBETRAG_2024: f64 = 11_604.0;

/// Income tax per §32a EStG (2024) on a taxable income (zvE), whole euros
#[must_use]
pub fn german_income_tax_2024(taxable_income: f64) -> f64 {
    let zve = taxable_income.max(0.0).floor();
    let tax = if zve <= GRUNDFREIBETRAG_2024 {
        0.0
    } else if zve <= 17_005.0 {
        let y = (zve - GRUNDFREIBETRAG_2024) / 10_000.0;
        (922.98 * y + 1_400.0) * y
    } else if zve <= 66_760.0 {
        let z = (zve - 17_005.0) / 10_000.0;
        (181.19 * z + 2_397.0) * z + 1_025.38
    } else if zve <= 277_825.0 {
        0.42 * zve - 10_602.13
    } else {
        0.45 * zve - 18_936.88
    };
    tax.floor()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomeTaxResult {
    /// Income above the basic allowance
    pub taxable_income: f64,
    pub tax: f64,
    pub basic_allowance_used: f64,
}

/// Income tax on `gross_income` after the basic allowance.
///
/// The allowance is fully available every year. For the progressive schedule
/// the zones are measured from the configured allowance, so a custom
/// Grundfreibetrag shifts the whole curve.
#[must_use]
pub fn income_tax_with_basic_allowance(
    gross_income: f64,
    basic_allowance: f64,
    schedule: &IncomeTaxSchedule,
) -> IncomeTaxResult {
    let gross = gross_income.max(0.0);
    let allowance = basic_allowance.max(0.0);
    let basic_allowance_used = gross.min(allowance);
    let taxable_income = gross - basic_allowance_used;
    let tax = match schedule {
        _ if taxable_income <= 0.0 => 0.0,
        IncomeTaxSchedule::Flat { rate } => taxable_income * rate,
        IncomeTaxSchedule::Progressive2024 => {
            german_income_tax_2024(taxable_income + GRUNDFREIBETRAG_2024)
        }
    };
    IncomeTaxResult {
        taxable_income,
        tax,
        basic_allowance_used,
    }
}

/// Taxable portion of a statutory pension; `taxable_percentage` is in percent
#[must_use]
pub fn statutory_pension_taxable_portion(gross_annual_pension: f64, taxable_percentage: f64) -> f64 {
    gross_annual_pension * taxable_percentage / 100.0
}

/// Besteuerungsanteil (percent) for pensions starting in `start_year`.
///
/// 50% up to 2005, +2 points per year to 80% in 2020, +1 point to 82% in
/// 2022, +0.5 points per year from 2023, 100% from 2058 on.
#[must_use]
pub fn pension_taxable_percentage_for_start_year(start_year: i16) -> f64 {
    let year = f64::from(start_year);
    let pct = if start_year <= 2005 {
        50.0
    } else if start_year <= 2020 {
        50.0 + 2.0 * (year - 2005.0)
    } else if start_year <= 2022 {
        80.0 + (year - 2020.0)
    } else {
        82.5 + 0.5 * (year - 2023.0)
    };
    pct.min(100.0)
}

/// Statutory pension figures of one year
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PensionYear {
    pub gross: f64,
    pub taxable: f64,
    /// Income tax attributed to the pension
    pub tax: f64,
    pub net: f64,
}

impl PensionYear {
    /// Gross and taxable pension for `year`, before income tax is attributed
    #[must_use]
    pub fn for_year(pension: &StatutoryPension, year: i16) -> Option<Self> {
        if year < pension.start_year {
            return None;
        }
        let gross = pension.gross_for_year(year);
        Some(PensionYear {
            gross,
            taxable: statutory_pension_taxable_portion(gross, pension.taxable_percentage),
            tax: 0.0,
            net: gross,
        })
    }
}

/// Other-income figures of one year, summed over all active sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OtherIncomeYear {
    pub gross_amount: f64,
    pub net_amount: f64,
    pub tax: f64,
    pub source_count: usize,
}

/// Sum the active sources for `year`; `None` when no source is active
#[must_use]
pub fn other_income_for_year(
    sources: &[OtherIncomeSource],
    year: i16,
    inflation_rate: f64,
) -> Option<OtherIncomeYear> {
    let mut total = OtherIncomeYear::default();
    for source in sources.iter().filter(|s| s.is_active(year)) {
        let amount = source.annual_amount(year, inflation_rate);
        let tax = if source.amount_is_gross {
            amount * source.tax_rate
        } else {
            0.0
        };
        total.gross_amount += amount;
        total.tax += tax;
        total.net_amount += amount - tax;
        total.source_count += 1;
    }
    (total.source_count > 0).then_some(total)
}

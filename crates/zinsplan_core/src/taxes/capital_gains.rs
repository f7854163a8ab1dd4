//! Capital-gains taxation of fund holdings: Vorabpauschale, Sparerpauschbetrag
//! and Günstigerprüfung.
//!
//! All functions are pure and total over non-negative inputs. Range checks
//! happen when the configuration is validated, not here.

use serde::{Deserialize, Serialize};

/// Share of the Basiszins yield that counts as Basisertrag (§18 InvStG)
pub const ADVANCE_LUMP_SUM_FACTOR: f64 = 0.7;

/// Combined rate of Abgeltungsteuer, Solidaritätszuschlag and church tax.
///
/// Church tax is deductible from the Abgeltungsteuer base (§32d EStG), so
/// the income-tax part shrinks to `25% / (1 + 25% × church_tax_rate)`.
#[must_use]
pub fn flat_tax_rate(church_tax_rate: f64) -> f64 {
    let income_tax = 0.25 / (1.0 + 0.25 * church_tax_rate);
    income_tax * (1.0 + 0.055 + church_tax_rate)
}

/// Result of the annual Vorabpauschale calculation for one holding
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvanceLumpSum {
    /// `start value × base rate × 0.7`
    pub basis_yield: f64,
    /// Basis yield capped at the actual gain of the year, never negative
    pub amount: f64,
    /// Amount remaining after the partial exemption
    pub taxable: f64,
    /// Tax on `taxable` at the flat rate, before any allowance
    pub tax: f64,
}

/// Vorabpauschale for a holding worth `start_of_year_value` on January 1st.
///
/// When `actual_gain` is known the lump sum is capped at it; a loss year
/// yields no lump sum.
#[must_use]
pub fn advance_lump_sum_tax(
    start_of_year_value: f64,
    base_rate: f64,
    partial_exemption: f64,
    flat_tax_rate: f64,
    actual_gain: Option<f64>,
) -> AdvanceLumpSum {
    let basis_yield = (start_of_year_value * base_rate * ADVANCE_LUMP_SUM_FACTOR).max(0.0);
    let amount = match actual_gain {
        Some(gain) => basis_yield.min(gain),
        None => basis_yield,
    }
    .max(0.0);
    let taxable = amount * (1.0 - partial_exemption);
    AdvanceLumpSum {
        basis_yield,
        amount,
        taxable,
        tax: taxable * flat_tax_rate,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRegime {
    /// Abgeltungsteuer
    FlatTax,
    /// Personal marginal income-tax rate
    PersonalRate,
}

/// Outcome of the Günstigerprüfung
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FavorabilityOutcome {
    pub regime: TaxRegime,
    pub effective_rate: f64,
    pub tax: f64,
}

/// Pick whichever of flat tax and personal marginal rate taxes `realized_gain`
/// less. Ties go to the flat tax.
#[must_use]
pub fn favorability_check(
    realized_gain: f64,
    personal_marginal_rate: f64,
    flat_tax_rate: f64,
) -> FavorabilityOutcome {
    let gain = realized_gain.max(0.0);
    if personal_marginal_rate < flat_tax_rate {
        FavorabilityOutcome {
            regime: TaxRegime::PersonalRate,
            effective_rate: personal_marginal_rate,
            tax: gain * personal_marginal_rate,
        }
    } else {
        FavorabilityOutcome {
            regime: TaxRegime::FlatTax,
            effective_rate: flat_tax_rate,
            tax: gain * flat_tax_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AllowanceApplication {
    pub taxable_after_allowance: f64,
    pub consumed: f64,
    pub remaining: f64,
}

/// Offset `taxable_amount` against what is left of the annual allowance
#[must_use]
pub fn apply_annual_allowance(taxable_amount: f64, remaining_allowance: f64) -> AllowanceApplication {
    let taxable = taxable_amount.max(0.0);
    let available = remaining_allowance.max(0.0);
    let consumed = taxable.min(available);
    AllowanceApplication {
        taxable_after_allowance: taxable - consumed,
        consumed,
        remaining: available - consumed,
    }
}

/// The Sparerpauschbetrag of one calendar year.
///
/// Every gain source of a year must draw from the same pool, in one pass;
/// a new pool is created for each year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllowancePool {
    total: f64,
    remaining: f64,
}

impl AllowancePool {
    #[must_use]
    pub fn new(total: f64) -> Self {
        let total = total.max(0.0);
        Self {
            total,
            remaining: total,
        }
    }

    pub fn consume(&mut self, taxable_amount: f64) -> AllowanceApplication {
        let application = apply_annual_allowance(taxable_amount, self.remaining);
        self.remaining = application.remaining;
        application
    }

    #[must_use]
    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    #[must_use]
    pub fn used(&self) -> f64 {
        self.total - self.remaining
    }
}

/// Share of a holding's value that is unrealized gain. `cost_basis` should
/// include Vorabpauschalen already taxed, since those reduce the sale gain.
#[must_use]
pub fn gain_ratio(holding_value: f64, cost_basis: f64) -> f64 {
    if holding_value <= 0.0 {
        return 0.0;
    }
    ((holding_value - cost_basis) / holding_value).clamp(0.0, 1.0)
}

/// Gain realized by selling `sale_amount` out of a holding (pro rata method)
#[must_use]
pub fn realized_gain(sale_amount: f64, holding_value: f64, cost_basis: f64) -> f64 {
    sale_amount.clamp(0.0, holding_value.max(0.0)) * gain_ratio(holding_value, cost_basis)
}

/// Capital-gains tax on a sale once the partial exemption and allowance have
/// been applied, honoring the Günstigerprüfung when a personal rate is given.
#[must_use]
pub fn tax_on_realized_gain(
    taxable_after_allowance: f64,
    flat_tax_rate: f64,
    personal_marginal_rate: Option<f64>,
) -> FavorabilityOutcome {
    match personal_marginal_rate {
        Some(personal) => favorability_check(taxable_after_allowance, personal, flat_tax_rate),
        None => FavorabilityOutcome {
            regime: TaxRegime::FlatTax,
            effective_rate: flat_tax_rate,
            tax: taxable_after_allowance.max(0.0) * flat_tax_rate,
        },
    }
}

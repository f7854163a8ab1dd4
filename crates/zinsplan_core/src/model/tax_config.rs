use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Rate schedule applied to income above the basic allowance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomeTaxSchedule {
    /// German progressive zones (§32a EStG, 2024), shifted so that the first
    /// zone starts at the configured basic allowance
    Progressive2024,
    /// One rate on everything above the basic allowance
    Flat { rate: f64 },
}

/// Tax law assumptions for one plan.
///
/// All rates are fractions (`0.26375` for 26.375%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxConfig {
    /// Capital-gains flat tax including solidarity surcharge (and church tax if any)
    pub flat_tax_rate: f64,
    /// Teilfreistellung: share of fund gains exempt from capital-gains tax
    pub partial_exemption: f64,
    /// Sparerpauschbetrag, shared by all gain sources within a calendar year
    pub annual_allowance: f64,
    #[serde(default)]
    pub allowance_by_year: BTreeMap<i16, f64>,
    /// Basiszins for the Vorabpauschale
    pub base_rate: f64,
    #[serde(default)]
    pub base_rate_by_year: BTreeMap<i16, f64>,
    /// Personal marginal income-tax rate. `Some` enables the Günstigerprüfung
    /// on realized gains.
    #[serde(default)]
    pub personal_marginal_rate: Option<f64>,
    /// Grundfreibetrag, reusable in full every year
    pub basic_allowance: f64,
    pub income_tax_schedule: IncomeTaxSchedule,
}

impl TaxConfig {
    /// Sparerpauschbetrag in effect for `year`
    #[must_use]
    pub fn allowance_for(&self, year: i16) -> f64 {
        self.allowance_by_year
            .get(&year)
            .copied()
            .unwrap_or(self.annual_allowance)
    }

    /// Basiszins in effect for `year`
    #[must_use]
    pub fn base_rate_for(&self, year: i16) -> f64 {
        self.base_rate_by_year
            .get(&year)
            .copied()
            .unwrap_or(self.base_rate)
    }

    /// German rules as of 2024 for a single filer without church tax
    #[must_use]
    pub fn german_2024() -> Self {
        TaxConfig {
            flat_tax_rate: 0.26375,
            partial_exemption: 0.30,
            annual_allowance: 1_000.0,
            allowance_by_year: BTreeMap::new(),
            base_rate: 0.0229,
            base_rate_by_year: BTreeMap::from([(2023, 0.0255), (2024, 0.0229), (2025, 0.0253)]),
            personal_marginal_rate: None,
            basic_allowance: 11_604.0,
            income_tax_schedule: IncomeTaxSchedule::Progressive2024,
        }
    }
}

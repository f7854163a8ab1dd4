//! Savings-phase projection
//!
//! Every contribution element is projected year by year. Deposits made during
//! a year grow for the remaining months (`(1+r)^(m/12)`), fund costs are
//! charged on the time-weighted balance, and the Vorabpauschale is taxed on
//! the same base. Taxes are paid out of the holding. All elements draw from
//! one Sparerpauschbetrag pool per year, in element order.

use tracing::debug;

use crate::config::AccumulationConfig;
use crate::error::{Result, SimulationError};
use crate::model::{
    AccumulationResult, AccumulationYear, ContributionElement, ElementYear, PortfolioSnapshot,
    ReturnSeries, TaxConfig,
};
use crate::progress::CancellationToken;
use crate::taxes::{AllowancePool, advance_lump_sum_tax};

/// Position of one element carried between years
#[derive(Debug, Clone, Copy, Default)]
struct Holding {
    capital: f64,
    cost_basis: f64,
    accumulated_advance_lump_sum: f64,
}

/// Project all elements of `config` through the savings years.
///
/// Elements are cloned into the result with their ledgers filled; the
/// configuration itself is left untouched, so re-running replaces the
/// ledgers rather than extending them.
pub fn simulate_accumulation(
    config: &AccumulationConfig,
    tax: &TaxConfig,
    returns: &ReturnSeries,
    cancel: &CancellationToken,
) -> Result<AccumulationResult> {
    debug!(
        start_year = config.start_year,
        end_year = config.end_year,
        elements = config.elements.len(),
        "starting accumulation"
    );

    let mut elements: Vec<ContributionElement> = config
        .elements
        .iter()
        .map(|element| {
            let mut element = element.clone();
            element.ledger.clear();
            element
        })
        .collect();
    let mut holdings = vec![Holding::default(); elements.len()];
    let mut years = Vec::with_capacity((config.end_year - config.start_year + 1).max(0) as usize);

    for year in config.start_year..=config.end_year {
        if cancel.is_cancelled() {
            debug!(year, "accumulation cancelled");
            return Err(SimulationError::Cancelled);
        }
        let rate = returns.rate(year).ok_or(SimulationError::MissingReturn(year))?;
        let base_rate = tax.base_rate_for(year);
        let mut pool = AllowancePool::new(tax.allowance_for(year));
        let mut summary = AccumulationYear {
            year,
            ..Default::default()
        };

        for (element, holding) in elements.iter_mut().zip(holdings.iter_mut()) {
            let entry = project_element_year(element, holding, year, rate, base_rate, tax, &mut pool);
            element.ledger.insert(year, entry);

            summary.starting_capital += entry.starting_capital;
            summary.deposits += entry.deposits;
            summary.growth += entry.growth;
            summary.costs += entry.costs;
            summary.tax_paid += entry.tax_paid;
            summary.allowance_used += entry.allowance_used;
            summary.advance_lump_sum += entry.advance_lump_sum;
            summary.ending_capital += entry.ending_capital;
        }
        years.push(summary);
    }

    let snapshot = holdings.iter().fold(PortfolioSnapshot::default(), |acc, h| {
        PortfolioSnapshot {
            capital: acc.capital + h.capital,
            cost_basis: acc.cost_basis + h.cost_basis,
            accumulated_advance_lump_sum: acc.accumulated_advance_lump_sum
                + h.accumulated_advance_lump_sum,
        }
    });
    debug!(
        capital = snapshot.capital,
        cost_basis = snapshot.cost_basis,
        "accumulation finished"
    );

    Ok(AccumulationResult {
        elements,
        years,
        snapshot,
    })
}

fn project_element_year(
    element: &ContributionElement,
    holding: &mut Holding,
    year: i16,
    rate: f64,
    base_rate: f64,
    tax: &TaxConfig,
    pool: &mut AllowancePool,
) -> ElementYear {
    let starting_capital = holding.capital;
    let deposits = element.deposits_in_year(year);

    let mut deposit_total = 0.0;
    let mut deposit_growth = 0.0;
    // Balance weighted by the share of the year it was invested
    let mut weighted_balance = starting_capital;
    for &(month, amount) in &deposits {
        let months_invested = f64::from(13 - month);
        deposit_total += amount;
        deposit_growth += amount * ((1.0 + rate).powf(months_invested / 12.0) - 1.0);
        weighted_balance += amount * months_invested / 12.0;
    }

    let growth = starting_capital * rate + deposit_growth;
    let costs = weighted_balance * element.annual_cost_rate;

    let lump_sum = advance_lump_sum_tax(
        weighted_balance,
        base_rate,
        tax.partial_exemption,
        tax.flat_tax_rate,
        Some(growth - costs),
    );
    let allowance = pool.consume(lump_sum.taxable);
    let tax_paid = allowance.taxable_after_allowance * tax.flat_tax_rate;

    let ending_capital = (starting_capital + deposit_total + growth - costs - tax_paid).max(0.0);

    holding.capital = ending_capital;
    holding.cost_basis += deposit_total;
    holding.accumulated_advance_lump_sum += lump_sum.amount;

    ElementYear {
        starting_capital,
        deposits: deposit_total,
        growth,
        costs,
        tax_paid,
        allowance_used: allowance.consumed,
        advance_lump_sum: lump_sum.amount,
        accumulated_advance_lump_sum: holding.accumulated_advance_lump_sum,
        ending_capital,
    }
}

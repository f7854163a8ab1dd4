//! Contribution elements of the savings phase

use jiff::civil::Date;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::ids::ElementId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContributionKind {
    /// Recurring deposits of `annual_amount` per year. Monthly plans pay
    /// `annual_amount / 12` at the start of every active month, yearly plans
    /// pay once in the first active month of each year.
    SavingsPlan { annual_amount: f64, monthly: bool },
    /// One deposit on the start date
    LumpSum { amount: f64 },
}

/// Ledger entry of one element for one year
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementYear {
    pub starting_capital: f64,
    pub deposits: f64,
    pub growth: f64,
    /// Fund costs (TER) charged in the year
    pub costs: f64,
    pub tax_paid: f64,
    pub allowance_used: f64,
    pub advance_lump_sum: f64,
    /// All Vorabpauschalen taxed so far, reducing the gain at a later sale
    pub accumulated_advance_lump_sum: f64,
    pub ending_capital: f64,
}

/// A savings plan or lump sum invested during the accumulation phase.
///
/// The ledger is filled by the accumulation simulator and replaced on every
/// re-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionElement {
    pub id: ElementId,
    pub name: String,
    pub kind: ContributionKind,
    pub start: Date,
    /// Last date a deposit may be made (inclusive); open-ended when `None`
    #[serde(default)]
    pub end: Option<Date>,
    /// Annual fund cost rate (TER)
    #[serde(default)]
    pub annual_cost_rate: f64,
    #[serde(skip)]
    pub ledger: FxHashMap<i16, ElementYear>,
}

impl ContributionElement {
    #[must_use]
    pub fn savings_plan(id: u16, name: &str, annual_amount: f64, monthly: bool, start: Date) -> Self {
        Self::with_kind(id, name, ContributionKind::SavingsPlan { annual_amount, monthly }, start)
    }

    #[must_use]
    pub fn lump_sum(id: u16, name: &str, amount: f64, date: Date) -> Self {
        Self::with_kind(id, name, ContributionKind::LumpSum { amount }, date)
    }

    fn with_kind(id: u16, name: &str, kind: ContributionKind, start: Date) -> Self {
        ContributionElement {
            id: ElementId(id),
            name: name.to_string(),
            kind,
            start,
            end: None,
            annual_cost_rate: 0.0,
            ledger: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn until(mut self, end: Date) -> Self {
        self.end = Some(end);
        self
    }

    #[must_use]
    pub fn with_cost_rate(mut self, rate: f64) -> Self {
        self.annual_cost_rate = rate;
        self
    }

    /// Deposits made in `year` as `(month, amount)` pairs, months 1-12
    #[must_use]
    pub fn deposits_in_year(&self, year: i16) -> Vec<(i8, f64)> {
        match self.kind {
            ContributionKind::LumpSum { amount } => {
                if self.start.year() == year {
                    vec![(self.start.month(), amount)]
                } else {
                    Vec::new()
                }
            }
            ContributionKind::SavingsPlan {
                annual_amount,
                monthly,
            } => {
                let Some((first, last)) = self.active_months(year) else {
                    return Vec::new();
                };
                if monthly {
                    let per_month = annual_amount / 12.0;
                    (first..=last).map(|m| (m, per_month)).collect()
                } else {
                    vec![(first, annual_amount)]
                }
            }
        }
    }

    /// First and last month within `year` during which the plan is running
    fn active_months(&self, year: i16) -> Option<(i8, i8)> {
        if year < self.start.year() {
            return None;
        }
        let first = if year == self.start.year() {
            self.start.month()
        } else {
            1
        };
        let last = match self.end {
            Some(end) if end.year() < year => return None,
            Some(end) if end.year() == year => end.month(),
            _ => 12,
        };
        (first <= last).then_some((first, last))
    }

    /// Ledger entry for `year`, if the element was simulated in that year
    #[must_use]
    pub fn year(&self, year: i16) -> Option<&ElementYear> {
        self.ledger.get(&year)
    }

    /// Sum of deposits across the simulated ledger
    #[must_use]
    pub fn total_deposits(&self) -> f64 {
        self.ledger.values().map(|y| y.deposits).sum()
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;

    #[test]
    fn test_monthly_plan_partial_first_year() {
        let plan = ContributionElement::savings_plan(0, "ETF", 1_200.0, true, date(2025, 4, 1));
        let deposits = plan.deposits_in_year(2025);
        assert_eq!(deposits.len(), 9);
        assert_eq!(deposits[0], (4, 100.0));
        assert!(plan.deposits_in_year(2024).is_empty());
        assert_eq!(plan.deposits_in_year(2026).len(), 12);
    }

    #[test]
    fn test_yearly_plan_respects_end_date() {
        let plan = ContributionElement::savings_plan(0, "ETF", 6_000.0, false, date(2025, 1, 1))
            .until(date(2027, 6, 30));
        assert_eq!(plan.deposits_in_year(2025), vec![(1, 6_000.0)]);
        assert_eq!(plan.deposits_in_year(2027), vec![(1, 6_000.0)]);
        assert!(plan.deposits_in_year(2028).is_empty());
    }

    #[test]
    fn test_lump_sum_only_in_start_year() {
        let lump = ContributionElement::lump_sum(1, "Erbe", 50_000.0, date(2026, 7, 15));
        assert_eq!(lump.deposits_in_year(2026), vec![(7, 50_000.0)]);
        assert!(lump.deposits_in_year(2027).is_empty());
    }
}

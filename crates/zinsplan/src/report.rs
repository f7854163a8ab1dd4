//! Plain-text and JSON reports
//!
//! Ratios are always reported capped (see [`PerformanceMetrics::capped`]) so
//! neither format ever shows an infinite value.

use std::io::{self, Write};

use serde::Serialize;
use zinsplan_core::model::{AccumulationResult, MonteCarloSummary, WithdrawalResult};
use zinsplan_core::{
    Comparison, PerformanceMetrics, PlanResult, RankingKey, UNBOUNDED_RATIO, ValidationErrors,
};

/// Format a euro amount without cents, German style (`1.234.567 €`)
pub fn format_currency(value: f64) -> String {
    let euros = value.abs().round() as i64;

    let digits = euros.to_string();
    let mut result = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push('.');
        }
        result.push(c);
    }
    let grouped: String = result.chars().rev().collect();

    if value < 0.0 && euros > 0 {
        format!("-{grouped} €")
    } else {
        format!("{grouped} €")
    }
}

pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn format_ratio(value: f64) -> String {
    if value >= UNBOUNDED_RATIO {
        "no downside".to_string()
    } else {
        format!("{value:.2}")
    }
}

pub fn write_json<T: Serialize>(out: &mut impl Write, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

/// `result` with its metrics capped for output
pub fn capped_plan(result: &PlanResult) -> PlanResult {
    PlanResult {
        accumulation_metrics: result.accumulation_metrics.map(|m| m.capped()),
        withdrawal_metrics: result.withdrawal_metrics.capped(),
        ..result.clone()
    }
}

fn write_metrics(out: &mut impl Write, title: &str, metrics: &PerformanceMetrics) -> io::Result<()> {
    let metrics = metrics.capped();
    writeln!(out, "{title} ({} years)", metrics.observations)?;
    writeln!(
        out,
        "  annualized {:>8}   volatility {:>8}   max drawdown {:>8}",
        format_percentage(metrics.annualized_return),
        format_percentage(metrics.volatility),
        format_percentage(metrics.max_drawdown),
    )?;
    writeln!(
        out,
        "  sharpe {:>12}   sortino {:>11}   calmar {:>14}",
        format!("{:.2}", metrics.sharpe_ratio),
        format_ratio(metrics.sortino_ratio),
        format_ratio(metrics.calmar_ratio),
    )?;
    let rough = if metrics.value_at_risk_is_rough_estimate() {
        " (rough estimate)"
    } else {
        ""
    };
    writeln!(
        out,
        "  VaR 5% {:>12}{rough}   win rate {:>7}",
        format_percentage(metrics.value_at_risk_5),
        format_percentage(metrics.win_rate),
    )?;
    if let (Some(best), Some(worst)) = (metrics.best_year, metrics.worst_year) {
        writeln!(
            out,
            "  best {} {}   worst {} {}",
            best.year,
            format_percentage(best.return_rate),
            worst.year,
            format_percentage(worst.return_rate),
        )?;
    }
    Ok(())
}

fn write_accumulation(out: &mut impl Write, result: &AccumulationResult) -> io::Result<()> {
    writeln!(out, "Savings phase")?;
    writeln!(
        out,
        "{:>6} {:>14} {:>12} {:>12} {:>10} {:>10} {:>14}",
        "Year", "Start", "Deposits", "Growth", "Costs", "Tax", "End"
    )?;
    for year in &result.years {
        writeln!(
            out,
            "{:>6} {:>14} {:>12} {:>12} {:>10} {:>10} {:>14}",
            year.year,
            format_currency(year.starting_capital),
            format_currency(year.deposits),
            format_currency(year.growth),
            format_currency(year.costs),
            format_currency(year.tax_paid),
            format_currency(year.ending_capital),
        )?;
    }
    writeln!(
        out,
        "Deposits {}   final capital {}   taxes {}",
        format_currency(result.total_deposits()),
        format_currency(result.final_capital()),
        format_currency(result.total_taxes()),
    )
}

fn write_withdrawal(out: &mut impl Write, result: &WithdrawalResult) -> io::Result<()> {
    writeln!(out, "Withdrawal phase: {}", result.strategy.label())?;
    writeln!(
        out,
        "{:>6} {:>14} {:>8} {:>12} {:>10} {:>12} {:>14}",
        "Year", "Start", "Return", "Withdrawal", "Tax", "Net cash", "End"
    )?;
    for row in &result.rows {
        writeln!(
            out,
            "{:>6} {:>14} {:>8} {:>12} {:>10} {:>12} {:>14}",
            row.year,
            format_currency(row.starting_capital),
            format_percentage(row.return_rate),
            format_currency(row.paid_out()),
            format_currency(row.tax_paid),
            format_currency(row.net_cash_flow),
            format_currency(row.ending_capital),
        )?;
    }
    writeln!(
        out,
        "Withdrawn {}   taxes {}   final capital {}   lasted {}",
        format_currency(result.total_withdrawn()),
        format_currency(result.total_taxes()),
        format_currency(result.final_capital()),
        result.duration(),
    )
}

pub fn write_plan(out: &mut impl Write, result: &PlanResult) -> io::Result<()> {
    if let Some(accumulation) = &result.accumulation {
        write_accumulation(out, accumulation)?;
        if let Some(metrics) = &result.accumulation_metrics {
            write_metrics(out, "Savings returns", metrics)?;
        }
        writeln!(out)?;
    }
    write_withdrawal(out, &result.withdrawal)?;
    write_metrics(out, "Withdrawal returns", &result.withdrawal_metrics)?;

    if result.reproducible {
        writeln!(out, "Seed {} (reproducible)", result.seed)
    } else {
        writeln!(out, "Seed {} (not reproducible, drawn from entropy)", result.seed)
    }
}

pub fn write_comparison(
    out: &mut impl Write,
    comparison: &Comparison,
    ranking: RankingKey,
) -> io::Result<()> {
    writeln!(out, "Strategy comparison on {}", comparison.basis.label())?;
    writeln!(
        out,
        "{:<4} {:<28} {:>14} {:>14} {:>12} {:>12} {:>10}",
        "Rank", "Strategy", "Final capital", "Withdrawn", "Per year", "Taxes", "Lasted"
    )?;
    for (rank, result) in comparison.ranked(ranking).iter().enumerate() {
        writeln!(
            out,
            "{:<4} {:<28} {:>14} {:>14} {:>12} {:>12} {:>10}",
            rank + 1,
            result.name,
            format_currency(result.final_capital),
            format_currency(result.total_withdrawn),
            format_currency(result.average_annual_withdrawal),
            format_currency(result.total_taxes),
            result.duration.to_string(),
        )?;
    }
    Ok(())
}

pub fn write_monte_carlo(out: &mut impl Write, summary: &MonteCarloSummary) -> io::Result<()> {
    writeln!(
        out,
        "Monte Carlo: {} iterations (seed {})",
        summary.iterations, summary.seed
    )?;
    writeln!(out, "  success rate {}", format_percentage(summary.success_rate))?;
    writeln!(out, "  mean final capital {}", format_currency(summary.mean_final_capital))?;
    let p = summary.final_capital;
    for (label, value) in [
        ("P5", p.p5),
        ("P10", p.p10),
        ("P25", p.p25),
        ("P50", p.p50),
        ("P75", p.p75),
        ("P90", p.p90),
        ("P95", p.p95),
    ] {
        writeln!(out, "  {label:<4} {:>16}", format_currency(value))?;
    }
    match summary.median_depletion_year {
        Some(year) => writeln!(out, "  median depletion year {year}"),
        None => writeln!(out, "  capital never depleted"),
    }
}

pub fn write_validation_errors(out: &mut impl Write, errors: &ValidationErrors) -> io::Result<()> {
    writeln!(out, "Plan is invalid ({} problem(s)):", errors.len())?;
    for error in errors.iter() {
        writeln!(out, "  {}: {}", error.field, error.message)?;
    }
    Ok(())
}

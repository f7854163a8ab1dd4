//! Savings and retirement projection engine under German tax rules
//!
//! The crate projects a savings phase (ETF savings plans and lump sums) and
//! a withdrawal phase (one of several withdrawal strategies) year by year.
//! It covers:
//! - Return profiles: fixed, per-year, normal, log-normal, Student-t,
//!   historical DAX/MSCI World replay, block bootstrap and blended portfolios
//! - Abgeltungsteuer with Teilfreistellung, Sparerpauschbetrag,
//!   Vorabpauschale and Günstigerprüfung
//! - Statutory pension taxation, other income and health/care insurance
//! - Strategy comparison on a shared return path, Monte Carlo runs and
//!   performance/risk metrics
//!
//! # Usage
//!
//! ```ignore
//! use zinsplan_core::{CancellationToken, PlanInput, simulate};
//!
//! let plan = PlanInput::default().normalize().validate()?;
//! let result = simulate(&plan, &CancellationToken::new())?;
//! println!("{}", result.withdrawal.final_capital());
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod accumulation;
pub mod analysis;
pub mod comparison;
pub mod error;
pub mod optimization;
pub mod progress;
pub mod simulation;
pub mod strategy;
pub mod taxes;
pub mod withdrawal;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use analysis::{PerformanceMetrics, UNBOUNDED_RATIO, analyze_returns};
pub use comparison::{Comparison, ComparisonBasis, ComparisonResult, RankingKey, compare_strategies};
pub use config::{PlanConfig, PlanInput, ValidatedPlan};
pub use error::{MarketError, SimulationError, ValidationError, ValidationErrors};
pub use progress::CancellationToken;
pub use simulation::{PlanResult, monte_carlo, simulate};
pub use withdrawal::{SimulationPhase, WithdrawalSimulator};

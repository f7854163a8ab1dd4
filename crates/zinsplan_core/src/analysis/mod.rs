//! Performance and risk analysis of simulated return paths.
//!
//! The analyzer is a pure function over `(year, return)` pairs:
//!
//! ```ignore
//! use zinsplan_core::analysis::{analyze_returns, returns_from_withdrawal};
//!
//! let metrics = analyze_returns(&returns_from_withdrawal(&result)).capped();
//! ```

mod performance;

pub use performance::{
    PerformanceMetrics, ROUGH_ESTIMATE_THRESHOLD, UNBOUNDED_RATIO, YearReturn, analyze_returns,
    max_drawdown_of_path, percentile, returns_from_accumulation, returns_from_withdrawal,
};

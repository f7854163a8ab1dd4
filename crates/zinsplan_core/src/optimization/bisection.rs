//! Bisection search for single-parameter problems
//!
//! Finds the largest value in `[low, high]` that satisfies a monotone
//! feasibility predicate: every value below a feasible value is feasible.

use serde::{Deserialize, Serialize};

/// Relative width at which the search stops (0.01% of the upper bound)
pub const BISECTION_TOLERANCE: f64 = 1e-4;
/// Hard cap on predicate evaluations between the endpoints
pub const BISECTION_MAX_ITERATIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Converged,
    MaxIterationsReached,
    /// The upper bound itself is feasible
    UpperBoundFeasible,
    /// Not even the lower bound is feasible; the lower bound is returned
    NoFeasibleValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BisectionResult {
    pub value: f64,
    pub iterations: usize,
    pub termination: TerminationReason,
}

impl BisectionResult {
    #[must_use]
    pub fn converged(&self) -> bool {
        !matches!(self.termination, TerminationReason::MaxIterationsReached)
    }
}

/// Largest feasible value in `[low, high]`, to within `tolerance × |high|`
pub fn maximize_feasible<F>(
    low: f64,
    high: f64,
    tolerance: f64,
    max_iterations: usize,
    mut feasible: F,
) -> BisectionResult
where
    F: FnMut(f64) -> bool,
{
    if high <= low || feasible(high) {
        return BisectionResult {
            value: high.max(low),
            iterations: 0,
            termination: TerminationReason::UpperBoundFeasible,
        };
    }
    if !feasible(low) {
        return BisectionResult {
            value: low,
            iterations: 0,
            termination: TerminationReason::NoFeasibleValue,
        };
    }

    let width = tolerance * high.abs();
    let mut lo = low;
    let mut hi = high;
    let mut iterations = 0;
    while iterations < max_iterations && (hi - lo) > width {
        iterations += 1;
        let mid = f64::midpoint(lo, hi);
        if feasible(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    BisectionResult {
        value: lo,
        iterations,
        termination: if (hi - lo) <= width {
            TerminationReason::Converged
        } else {
            TerminationReason::MaxIterationsReached
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_threshold() {
        let result = maximize_feasible(0.0, 100.0, BISECTION_TOLERANCE, BISECTION_MAX_ITERATIONS, |x| {
            x * x <= 2_000.0
        });
        assert_eq!(result.termination, TerminationReason::Converged);
        assert!((result.value - 2_000.0_f64.sqrt()).abs() <= 100.0 * BISECTION_TOLERANCE);
        assert!(result.value * result.value <= 2_000.0);
    }

    #[test]
    fn test_bounds_shortcut() {
        let all = maximize_feasible(1.0, 5.0, BISECTION_TOLERANCE, BISECTION_MAX_ITERATIONS, |_| true);
        assert_eq!(all.termination, TerminationReason::UpperBoundFeasible);
        assert_eq!(all.value, 5.0);

        let none = maximize_feasible(1.0, 5.0, BISECTION_TOLERANCE, BISECTION_MAX_ITERATIONS, |_| false);
        assert_eq!(none.termination, TerminationReason::NoFeasibleValue);
        assert_eq!(none.value, 1.0);
    }

    #[test]
    fn test_iteration_cap() {
        let result = maximize_feasible(0.0, 1.0, 0.0, 5, |x| x < 0.3);
        assert_eq!(result.iterations, 5);
        assert_eq!(result.termination, TerminationReason::MaxIterationsReached);
        assert!(!result.converged());
    }
}

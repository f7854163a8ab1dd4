//! Numeric search used by the tax-optimized withdrawal strategy

mod bisection;

pub use bisection::{
    BISECTION_MAX_ITERATIONS, BISECTION_TOLERANCE, BisectionResult, TerminationReason,
    maximize_feasible,
};

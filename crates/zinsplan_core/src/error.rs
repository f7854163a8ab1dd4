use std::fmt;

use thiserror::Error;

/// Errors related to market/distribution operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    #[error("invalid {profile_type} parameters (mean={mean}, std_dev={std_dev}): {reason}")]
    InvalidDistributionParameters {
        profile_type: &'static str,
        mean: f64,
        std_dev: f64,
        reason: &'static str,
    },
    /// Historical data is empty and cannot be sampled
    #[error("historical data is empty")]
    EmptyHistoricalData,
    /// Historical replay requested for a year the bundled series does not cover
    #[error("historical series {index} has no data for {year}")]
    HistoricalYearNotCovered { index: &'static str, year: i16 },
}

/// A single configuration problem, addressed by its field path
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every problem found while validating a configuration.
///
/// Validation never stops at the first error so a form layer can mark all
/// offending fields at once.
#[derive(Debug, Clone, PartialEq, Default, Error)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationError::new(field, message));
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// True when some error was reported for `field` (exact path match)
    #[must_use]
    pub fn contains_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.0.len())?;
        for err in &self.0 {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}

/// Errors that abort a simulation run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// Cooperative cancellation was requested while the run was in progress
    #[error("simulation cancelled")]
    Cancelled,
    #[error(transparent)]
    Market(#[from] MarketError),
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
    /// The return series handed to a simulator does not cover a simulated year
    #[error("return series has no rate for year {0}")]
    MissingReturn(i16),
}

pub type Result<T> = std::result::Result<T, SimulationError>;

mod contributions;
mod ids;
mod income;
mod life_table;
mod market;
mod results;
mod strategy;
mod tax_config;

pub use contributions::{ContributionElement, ContributionKind, ElementYear};
pub use ids::ElementId;
pub use income::{HealthInsurance, InsuranceType, OtherIncomeSource, StatutoryPension};
pub use life_table::{LifeTable, LifeTableEntry};
pub use market::{
    Allocation, HistoricalIndex, ReturnGenerator, ReturnProfile, ReturnSeries,
};
pub use results::{
    AccumulationResult, AccumulationYear, BucketYear, FinalCapitalPercentiles, MonteCarloSummary,
    PlanDuration, PortfolioSnapshot, WithdrawalOutcome, WithdrawalResult, YearLedgerRow,
};
pub use strategy::{ComparisonVariant, Guardrails, StrategyConfig};
pub use tax_config::{IncomeTaxSchedule, TaxConfig};

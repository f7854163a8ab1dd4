//! Values filled in by [`PlanInput::normalize`](super::PlanInput::normalize)
//! for every field a plan file or form leaves empty.

/// Initial withdrawal rate of rate-based strategies (4% rule)
pub const BASE_WITHDRAWAL_RATE: f64 = 0.04;
pub const MONTHLY_WITHDRAWAL: f64 = 2_000.0;

/// Guardrail band around the expected return
pub const GUARDRAILS_THRESHOLD: f64 = 0.10;

pub const DYNAMIC_UPPER_THRESHOLD: f64 = 0.15;
pub const DYNAMIC_UPPER_ADJUSTMENT: f64 = 0.05;
pub const DYNAMIC_LOWER_THRESHOLD: f64 = -0.05;
pub const DYNAMIC_LOWER_ADJUSTMENT: f64 = 0.05;

pub const BUCKET_CUSHION_SIZE: f64 = 40_000.0;
/// Yearly portfolio gain (in euros) below which the cushion is not refilled
pub const BUCKET_REFILL_THRESHOLD: f64 = 10_000.0;
pub const BUCKET_REFILL_PERCENTAGE: f64 = 0.50;

pub const RMD_START_AGE: u8 = 65;

pub const TAX_OPTIMIZED_TARGET_RATE: f64 = 0.10;
pub const TAX_OPTIMIZED_MIN_RATE: f64 = 0.02;
pub const TAX_OPTIMIZED_MAX_RATE: f64 = 0.06;

/// Abgeltungsteuer 25% plus 5.5% Solidaritätszuschlag
pub const FLAT_TAX_RATE: f64 = 0.26375;
/// Teilfreistellung of equity funds
pub const PARTIAL_EXEMPTION: f64 = 0.30;
/// Sparerpauschbetrag of a single filer since 2023
pub const ANNUAL_ALLOWANCE: f64 = 1_000.0;
/// Basiszins 2024
pub const BASE_RATE: f64 = 0.0229;
/// Grundfreibetrag 2024
pub const BASIC_ALLOWANCE: f64 = 11_604.0;

pub const INFLATION_RATE: f64 = 0.02;
pub const FIXED_RETURN: f64 = 0.05;

pub const ACCUMULATION_YEARS: i16 = 20;
pub const WITHDRAWAL_YEARS: i16 = 30;
/// Horizon end age when a birth year is known but no horizon is given
pub const LIFE_EXPECTANCY_END_AGE: u8 = 90;

pub const PENSION_ANNUAL_INCREASE: f64 = 0.02;

pub const HEALTH_RATE: f64 = 0.146;
/// Average Zusatzbeitrag 2024
pub const HEALTH_ADDITIONAL_RATE: f64 = 0.017;
pub const CARE_RATE: f64 = 0.034;
pub const CARE_CHILDLESS_SURCHARGE: f64 = 0.006;
/// Beitragsbemessungsgrenze of the statutory health insurance, 2024
pub const HEALTH_CONTRIBUTION_CEILING: f64 = 62_100.0;
pub const PRIVATE_PREMIUM_INCREASE: f64 = 0.03;

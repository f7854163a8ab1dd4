//! Return Generator: per-year nominal returns for both plan phases.
//!
//! A [`ReturnProfile`] describes how returns are produced; a [`ReturnGenerator`]
//! turns a profile plus an optional seed into a concrete [`ReturnSeries`].
//! Seeded generators use `ChaCha8Rng`, whose output is specified independently
//! of platform and word size, so the same seed yields the same series
//! everywhere.

use std::collections::BTreeMap;

use rand::{Rng, RngCore, SeedableRng, distr::Distribution};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::MarketError;

/// Bundled annual total-return series (EUR, approximate, dividends reinvested)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoricalIndex {
    Dax,
    MsciWorld,
}

// DAX performance index, 2000-2023 (24 years)
// Arithmetic mean: 0.0626
const DAX_RETURNS: [(i16, f64); 24] = [
    (2000, -0.075),
    (2001, -0.198),
    (2002, -0.439),
    (2003, 0.371),
    (2004, 0.073),
    (2005, 0.271),
    (2006, 0.220),
    (2007, 0.223),
    (2008, -0.404),
    (2009, 0.238),
    (2010, 0.161),
    (2011, -0.147),
    (2012, 0.291),
    (2013, 0.255),
    (2014, 0.027),
    (2015, 0.096),
    (2016, 0.069),
    (2017, 0.125),
    (2018, -0.183),
    (2019, 0.255),
    (2020, 0.035),
    (2021, 0.158),
    (2022, -0.123),
    (2023, 0.203),
];

// MSCI World net return in EUR, 2000-2023 (24 years)
// Arithmetic mean: 0.0672
const MSCI_WORLD_RETURNS: [(i16, f64); 24] = [
    (2000, -0.017),
    (2001, -0.147),
    (2002, -0.320),
    (2003, 0.110),
    (2004, 0.068),
    (2005, 0.268),
    (2006, 0.079),
    (2007, -0.017),
    (2008, -0.376),
    (2009, 0.260),
    (2010, 0.195),
    (2011, -0.024),
    (2012, 0.140),
    (2013, 0.212),
    (2014, 0.195),
    (2015, 0.104),
    (2016, 0.107),
    (2017, 0.075),
    (2018, -0.041),
    (2019, 0.300),
    (2020, 0.063),
    (2021, 0.311),
    (2022, -0.128),
    (2023, 0.196),
];

impl HistoricalIndex {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            HistoricalIndex::Dax => "DAX",
            HistoricalIndex::MsciWorld => "MSCI World",
        }
    }

    /// (year, return) pairs in chronological order
    #[must_use]
    pub fn series(self) -> &'static [(i16, f64)] {
        match self {
            HistoricalIndex::Dax => &DAX_RETURNS,
            HistoricalIndex::MsciWorld => &MSCI_WORLD_RETURNS,
        }
    }

    #[must_use]
    pub fn first_year(self) -> i16 {
        self.series()[0].0
    }

    #[must_use]
    pub fn last_year(self) -> i16 {
        self.series()[self.series().len() - 1].0
    }

    #[must_use]
    pub fn covers(self, year: i16) -> bool {
        (self.first_year()..=self.last_year()).contains(&year)
    }

    #[must_use]
    pub fn mean(self) -> f64 {
        let s = self.series();
        s.iter().map(|(_, r)| r).sum::<f64>() / s.len() as f64
    }

    /// Replay the series from `start_year`, wrapping to the first year when
    /// the end of the data is reached.
    fn replay(self, start_year: i16, n: usize) -> Result<Vec<f64>, MarketError> {
        let s = self.series();
        let offset = s
            .iter()
            .position(|(y, _)| *y == start_year)
            .ok_or(MarketError::HistoricalYearNotCovered {
                index: self.name(),
                year: start_year,
            })?;
        Ok((0..n).map(|i| s[(offset + i) % s.len()].1).collect())
    }

    /// Block bootstrap: draw contiguous blocks of `block_size` years starting
    /// at uniformly chosen positions (wrapping) until `n` values are collected.
    fn block_bootstrap<R: Rng + ?Sized>(self, rng: &mut R, n: usize, block_size: usize) -> Vec<f64> {
        let s = self.series();
        let block_size = block_size.max(1);
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let start = rng.random_range(0..s.len());
            for k in 0..block_size {
                if out.len() == n {
                    break;
                }
                out.push(s[(start + k) % s.len()].1);
            }
        }
        out
    }
}

/// One weighted component of a blended (multi-asset) profile.
/// Weights are fractions and must sum to 1.0 across a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub weight: f64,
    pub profile: ReturnProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReturnProfile {
    /// Same return every year
    Fixed { rate: f64 },
    /// Explicit return per year; years not listed use `default_rate`
    Variable {
        rates: BTreeMap<i16, f64>,
        default_rate: f64,
    },
    /// Normally distributed Monte Carlo returns
    Random { mean: f64, std_dev: f64 },
    /// Log-normal gross returns parameterized by the arithmetic mean and
    /// standard deviation of the net return
    LogNormal { mean: f64, std_dev: f64 },
    /// Student's t distribution for fat-tailed returns.
    /// - `scale`: similar to `std_dev` but adjusted for df
    /// - `df`: lower = fatter tails, typically 4-6 for equities
    StudentT { mean: f64, scale: f64, df: f64 },
    /// Replay a bundled historical sequence starting at `start_year`
    Historical {
        index: HistoricalIndex,
        start_year: i16,
    },
    /// Resample a bundled historical sequence in blocks
    Bootstrap {
        index: HistoricalIndex,
        block_size: usize,
    },
    /// Weighted combination of component profiles
    Blended { components: Vec<Allocation> },
}

impl ReturnProfile {
    pub const MSCI_WORLD_FIXED: ReturnProfile = ReturnProfile::Fixed { rate: 0.07 };
    pub const MSCI_WORLD_NORMAL: ReturnProfile = ReturnProfile::Random {
        mean: 0.07,
        std_dev: 0.15,
    };
    pub const MSCI_WORLD_STUDENT_T: ReturnProfile = ReturnProfile::StudentT {
        mean: 0.07,
        scale: 0.116_190, // 0.15 * sqrt(3/5), variance-matched for df=5
        df: 5.0,
    };

    /// Whether sampling consumes randomness
    #[must_use]
    pub fn is_stochastic(&self) -> bool {
        match self {
            ReturnProfile::Fixed { .. }
            | ReturnProfile::Variable { .. }
            | ReturnProfile::Historical { .. } => false,
            ReturnProfile::Random { .. }
            | ReturnProfile::LogNormal { .. }
            | ReturnProfile::StudentT { .. }
            | ReturnProfile::Bootstrap { .. } => true,
            ReturnProfile::Blended { components } => {
                components.iter().any(|c| c.profile.is_stochastic())
            }
        }
    }

    /// Mean nominal return implied by the profile
    #[must_use]
    pub fn expected_return(&self) -> f64 {
        match self {
            ReturnProfile::Fixed { rate } => *rate,
            ReturnProfile::Variable {
                rates,
                default_rate,
            } => {
                if rates.is_empty() {
                    *default_rate
                } else {
                    rates.values().sum::<f64>() / rates.len() as f64
                }
            }
            ReturnProfile::Random { mean, .. }
            | ReturnProfile::LogNormal { mean, .. }
            | ReturnProfile::StudentT { mean, .. } => *mean,
            ReturnProfile::Historical { index, .. } | ReturnProfile::Bootstrap { index, .. } => {
                index.mean()
            }
            ReturnProfile::Blended { components } => components
                .iter()
                .map(|c| c.weight * c.profile.expected_return())
                .sum(),
        }
    }

    /// Sample one return per entry of `years`, in order.
    pub fn sample_sequence<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        years: &[i16],
    ) -> Result<Vec<f64>, MarketError> {
        let n = years.len();
        match self {
            ReturnProfile::Fixed { rate } => Ok(vec![*rate; n]),
            ReturnProfile::Variable {
                rates,
                default_rate,
            } => Ok(years
                .iter()
                .map(|y| rates.get(y).copied().unwrap_or(*default_rate))
                .collect()),
            ReturnProfile::Random { mean, std_dev } => {
                let dist = rand_distr::Normal::new(*mean, *std_dev).map_err(|_| {
                    MarketError::InvalidDistributionParameters {
                        profile_type: "Normal return",
                        mean: *mean,
                        std_dev: *std_dev,
                        reason: "std_dev must be non-negative and finite",
                    }
                })?;
                Ok((0..n).map(|_| dist.sample(rng)).collect())
            }
            ReturnProfile::LogNormal { mean, std_dev } => {
                let gross = 1.0 + mean;
                if gross <= 0.0 {
                    return Err(MarketError::InvalidDistributionParameters {
                        profile_type: "LogNormal return",
                        mean: *mean,
                        std_dev: *std_dev,
                        reason: "mean must be greater than -100%",
                    });
                }
                let sigma2 = (1.0 + std_dev * std_dev / (gross * gross)).ln();
                let mu = gross.ln() - sigma2 / 2.0;
                let dist = rand_distr::LogNormal::new(mu, sigma2.sqrt()).map_err(|_| {
                    MarketError::InvalidDistributionParameters {
                        profile_type: "LogNormal return",
                        mean: *mean,
                        std_dev: *std_dev,
                        reason: "std_dev must be non-negative and finite",
                    }
                })?;
                Ok((0..n).map(|_| dist.sample(rng) - 1.0).collect())
            }
            ReturnProfile::StudentT { mean, scale, df } => {
                let dist = rand_distr::StudentT::new(*df).map_err(|_| {
                    MarketError::InvalidDistributionParameters {
                        profile_type: "StudentT return",
                        mean: *mean,
                        std_dev: *scale,
                        reason: "degrees of freedom must be positive and finite",
                    }
                })?;
                Ok((0..n).map(|_| mean + scale * dist.sample(rng)).collect())
            }
            ReturnProfile::Historical { index, start_year } => index.replay(*start_year, n),
            ReturnProfile::Bootstrap { index, block_size } => {
                if index.series().is_empty() {
                    return Err(MarketError::EmptyHistoricalData);
                }
                Ok(index.block_bootstrap(rng, n, *block_size))
            }
            ReturnProfile::Blended { components } => {
                let mut blended = vec![0.0; n];
                // Components are sampled in declaration order so a seed maps to
                // one sequence regardless of weights.
                for component in components {
                    let seq = component.profile.sample_sequence(rng, years)?;
                    for (acc, r) in blended.iter_mut().zip(seq) {
                        *acc += component.weight * r;
                    }
                }
                Ok(blended)
            }
        }
    }
}

/// Nominal return per calendar year over a contiguous range of years
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    start_year: i16,
    rates: Vec<f64>,
}

impl ReturnSeries {
    #[must_use]
    pub fn new(start_year: i16, rates: Vec<f64>) -> Self {
        Self { start_year, rates }
    }

    /// Same rate for every year in `start_year..=end_year`
    #[must_use]
    pub fn constant(start_year: i16, end_year: i16, rate: f64) -> Self {
        let n = (i32::from(end_year) - i32::from(start_year) + 1).max(0) as usize;
        Self::new(start_year, vec![rate; n])
    }

    #[must_use]
    pub fn rate(&self, year: i16) -> Option<f64> {
        let idx = i32::from(year) - i32::from(self.start_year);
        if idx < 0 {
            return None;
        }
        self.rates.get(idx as usize).copied()
    }

    #[must_use]
    pub fn start_year(&self) -> i16 {
        self.start_year
    }

    #[must_use]
    pub fn end_year(&self) -> Option<i16> {
        if self.rates.is_empty() {
            None
        } else {
            Some(self.start_year + self.rates.len() as i16 - 1)
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    #[must_use]
    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn iter(&self) -> impl Iterator<Item = (i16, f64)> + '_ {
        self.rates
            .iter()
            .enumerate()
            .map(|(i, r)| (self.start_year + i as i16, *r))
    }
}

/// Produces [`ReturnSeries`] from a profile.
///
/// Successive `generate` calls continue the same random stream, so an
/// accumulation phase followed by a withdrawal phase drawn from one generator
/// forms a single seeded path.
#[derive(Debug, Clone)]
pub struct ReturnGenerator {
    profile: ReturnProfile,
    rng: ChaCha8Rng,
    seed: u64,
    seeded: bool,
}

impl ReturnGenerator {
    /// With `seed = None` the generator draws its seed from the thread RNG;
    /// the drawn seed is still reported by [`ReturnGenerator::seed`].
    #[must_use]
    pub fn new(profile: ReturnProfile, seed: Option<u64>) -> Self {
        let (seed, seeded) = match seed {
            Some(s) => (s, true),
            None => (rand::rng().next_u64(), false),
        };
        Self {
            profile,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            seeded,
        }
    }

    #[must_use]
    pub fn profile(&self) -> &ReturnProfile {
        &self.profile
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// True when results are reproducible: either the caller supplied a
    /// seed or the profile is deterministic.
    #[must_use]
    pub fn is_reproducible(&self) -> bool {
        self.seeded || !self.profile.is_stochastic()
    }

    /// Returns for `start_year..=end_year` (empty when `end_year < start_year`)
    pub fn generate(&mut self, start_year: i16, end_year: i16) -> Result<ReturnSeries, MarketError> {
        let years: Vec<i16> = (start_year..=end_year).collect();
        let mut rates = self.profile.sample_sequence(&mut self.rng, &years)?;
        // Fat-tailed draws can fall below a total loss
        for rate in &mut rates {
            *rate = rate.max(-1.0);
        }
        Ok(ReturnSeries::new(start_year, rates))
    }
}

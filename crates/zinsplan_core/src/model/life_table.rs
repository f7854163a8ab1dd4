//! Life-expectancy tables for distribution-based withdrawals and
//! life-expectancy derived planning horizons.

use serde::{Deserialize, Serialize};

/// Remaining life expectancy keyed by age
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeTable {
    pub entries: Vec<LifeTableEntry>,
}

/// Single entry mapping an age to the remaining years of life expected at that age
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LifeTableEntry {
    pub age: u8,
    pub remaining_years: f64,
}

// Destatis period life table 2020/2022, average of male and female values
const GERMAN_2020_2022: [(u8, f64); 51] = [
    (50, 31.6),
    (51, 30.7),
    (52, 29.8),
    (53, 28.9),
    (54, 28.0),
    (55, 27.2),
    (56, 26.3),
    (57, 25.5),
    (58, 24.6),
    (59, 23.8),
    (60, 23.0),
    (61, 22.2),
    (62, 21.4),
    (63, 20.6),
    (64, 19.9),
    (65, 19.1),
    (66, 18.4),
    (67, 17.6),
    (68, 16.9),
    (69, 16.2),
    (70, 15.5),
    (71, 14.8),
    (72, 14.1),
    (73, 13.5),
    (74, 12.8),
    (75, 12.2),
    (76, 11.6),
    (77, 11.0),
    (78, 10.4),
    (79, 9.8),
    (80, 9.2),
    (81, 8.7),
    (82, 8.2),
    (83, 7.7),
    (84, 7.2),
    (85, 6.7),
    (86, 6.3),
    (87, 5.9),
    (88, 5.5),
    (89, 5.1),
    (90, 4.7),
    (91, 4.4),
    (92, 4.1),
    (93, 3.8),
    (94, 3.5),
    (95, 3.3),
    (96, 3.1),
    (97, 2.9),
    (98, 2.7),
    (99, 2.5),
    (100, 2.4),
];

impl LifeTable {
    /// German period life table 2020/2022 (unisex), ages 50 to 100
    #[must_use]
    pub fn german_2020_2022() -> Self {
        LifeTable {
            entries: GERMAN_2020_2022
                .iter()
                .map(|&(age, remaining_years)| LifeTableEntry {
                    age,
                    remaining_years,
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn first_age(&self) -> Option<u8> {
        self.entries.first().map(|e| e.age)
    }

    #[must_use]
    pub fn last_age(&self) -> Option<u8> {
        self.entries.last().map(|e| e.age)
    }

    /// Exact table entry for `age`
    #[must_use]
    pub fn remaining_years(&self, age: u8) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.age == age)
            .map(|e| e.remaining_years)
    }

    /// Divisor for `age`. Ages past the end of the table use the last entry,
    /// ages before the start use the first one. An empty table yields 0.
    #[must_use]
    pub fn factor(&self, age: u8) -> f64 {
        if let Some(years) = self.remaining_years(age) {
            return years;
        }
        match (self.entries.first(), self.entries.last()) {
            (Some(first), _) if age < first.age => first.remaining_years,
            (_, Some(last)) if age > last.age => last.remaining_years,
            _ => self
                .entries
                .iter()
                .take_while(|e| e.age < age)
                .last()
                .map_or(0.0, |e| e.remaining_years),
        }
    }

    /// Whether entries are strictly increasing by age with positive divisors
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.entries.is_empty()
            && self.entries.windows(2).all(|w| w[0].age < w[1].age)
            && self.entries.iter().all(|e| e.remaining_years > 0.0)
    }
}

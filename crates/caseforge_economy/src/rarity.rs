//! # Rarity Table
//!
//! The global drop odds, independent of which case is opened.
//!
//! The table is an ordered list of `(id, chance)` pairs whose chances sum to
//! 1.0. Order matters: a roll walks the list accumulating chances and stops
//! at the first tier whose cumulative boundary reaches the roll, so the LAST
//! entry absorbs whatever floating-point slack the sum leaves behind.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};

/// Tolerance when checking that chances sum to 1.0.
pub const CHANCE_SUM_TOLERANCE: f64 = 1e-6;

/// Identifier of a rarity tier (e.g. `"1"` .. `"5"`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RarityId(pub String);

impl RarityId {
    /// Creates a rarity id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RarityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RarityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One tier of the table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rarity {
    /// Tier identifier referenced by items.
    pub id: RarityId,
    /// Probability of this tier being rolled.
    pub chance: f64,
}

/// Ordered, validated rarity table.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RarityTable {
    rarities: Vec<Rarity>,
}

impl RarityTable {
    /// Builds a table, checking every invariant.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidConfig` if the table is empty, has a
    /// duplicate id, a negative or non-finite chance, or chances that do not
    /// sum to 1.0 within [`CHANCE_SUM_TOLERANCE`].
    pub fn new(rarities: Vec<Rarity>) -> EconomyResult<Self> {
        if rarities.is_empty() {
            return Err(EconomyError::InvalidConfig("rarity table is empty".into()));
        }

        let mut seen = HashSet::with_capacity(rarities.len());
        for rarity in &rarities {
            if !seen.insert(&rarity.id) {
                return Err(EconomyError::InvalidConfig(format!(
                    "duplicate rarity id {}",
                    rarity.id
                )));
            }
            if !rarity.chance.is_finite() || rarity.chance < 0.0 {
                return Err(EconomyError::InvalidConfig(format!(
                    "rarity {} has invalid chance {}",
                    rarity.id, rarity.chance
                )));
            }
        }

        let sum: f64 = rarities.iter().map(|r| r.chance).sum();
        if (sum - 1.0).abs() > CHANCE_SUM_TOLERANCE {
            return Err(EconomyError::InvalidConfig(format!(
                "rarity chances sum to {sum}, expected 1.0"
            )));
        }

        Ok(Self { rarities })
    }

    /// The production table.
    #[must_use]
    pub fn standard() -> Self {
        let rarities = [
            ("1", 0.7992),
            ("2", 0.1598),
            ("3", 0.032),
            ("4", 0.0064),
            ("5", 0.0026),
        ]
        .into_iter()
        .map(|(id, chance)| Rarity {
            id: RarityId::new(id),
            chance,
        })
        .collect();

        Self { rarities }
    }

    /// Tiers in table order.
    #[must_use]
    pub fn rarities(&self) -> &[Rarity] {
        &self.rarities
    }

    /// Number of tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rarities.len()
    }

    /// Always false for a validated table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rarities.is_empty()
    }

    /// Configured chance of a tier, if it exists.
    #[must_use]
    pub fn chance_of(&self, id: &RarityId) -> Option<f64> {
        self.rarities.iter().find(|r| &r.id == id).map(|r| r.chance)
    }

    /// Maps a roll in `[0, 1)` to a tier.
    ///
    /// Selects the first tier whose cumulative chance is `>= roll`. A roll
    /// beyond the accumulated sum selects the last tier.
    #[must_use]
    pub fn select(&self, roll: f64) -> &Rarity {
        let mut cumulative = 0.0;
        for rarity in &self.rarities {
            cumulative += rarity.chance;
            if roll <= cumulative {
                return rarity;
            }
        }
        // Validated tables are never empty.
        &self.rarities[self.rarities.len() - 1]
    }
}

impl Default for RarityTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl<'de> Deserialize<'de> for RarityTable {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rarities = Vec::<Rarity>::deserialize(deserializer)?;
        Self::new(rarities).map_err(serde::de::Error::custom)
    }
}

//! # Economy Configuration
//!
//! Loaded once at startup from TOML. Every section is optional:
//!
//! ```toml
//! [[rarities]]
//! id = "1"
//! chance = 0.7992
//! # ...more tiers, summing to 1.0
//!
//! [opening]
//! max_batch = 5
//!
//! [leveling]
//! xp_per_coin = 1
//! base_level_xp = 100
//!
//! [broadcast]
//! queue_capacity = 1024
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};
use crate::leveling::LevelCurve;
use crate::rarity::RarityTable;

/// Case-opening limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpeningConfig {
    /// Most cases one request may open.
    pub max_batch: u32,
}

impl Default for OpeningConfig {
    fn default() -> Self {
        Self { max_batch: 5 }
    }
}

/// Outcome broadcaster settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Events that may wait for the dispatcher before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

/// Process-wide economy configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Ordered rarity tiers.
    pub rarities: RarityTable,
    /// Batch limits.
    pub opening: OpeningConfig,
    /// XP/level curve.
    pub leveling: LevelCurve,
    /// Broadcast queue.
    pub broadcast: BroadcastConfig,
}

impl EconomyConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidConfig` on malformed TOML, a rarity table
    /// that does not sum to 1, or out-of-range limits.
    pub fn from_toml_str(source: &str) -> EconomyResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EconomyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidConfig` if the file cannot be read or is invalid.
    pub fn from_toml(path: impl AsRef<Path>) -> EconomyResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| EconomyError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Checks limits that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidConfig` describing the first bad value.
    pub fn validate(&self) -> EconomyResult<()> {
        if self.opening.max_batch == 0 {
            return Err(EconomyError::InvalidConfig(
                "opening.max_batch must be at least 1".into(),
            ));
        }
        if self.broadcast.queue_capacity == 0 {
            return Err(EconomyError::InvalidConfig(
                "broadcast.queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

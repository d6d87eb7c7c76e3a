//! # Case Draw System
//!
//! **Two-stage weighted draw: rarity first, then item.**
//!
//! ```text
//! Case items ──> ItemPool::index() ──> { rarity -> [items] }     (once per request)
//!                                            │
//!            roll x in [0,1) ──> RarityTable::select(x)            (per draw)
//!                                            │
//!                     bucket non-empty? ──yes──> uniform item in bucket
//!                           │ no
//!                           ▼
//!        uniform rarity among the case's non-empty buckets ──> uniform item
//! ```
//!
//! Per-item probability is `chance / bucket_size` for every rarity the case
//! holds, regardless of how many items share a tier. The fallback for tiers
//! the case lacks picks among present tiers uniformly, NOT by their original
//! weight.
//!
//! The engine never owns randomness. Callers pass an `Rng`, so tests can
//! seed it and concurrent requests never share a generator.

use std::collections::HashMap;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};
use crate::fixed_point::FixedPoint;
use crate::inventory::{Item, ItemId};
use crate::rarity::{RarityId, RarityTable};

/// Unique identifier for a case.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub String);

impl CaseId {
    /// Creates a case id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CaseId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A purchasable case and its item pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    /// Case identifier.
    pub id: CaseId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Image shown in the spectator feed.
    #[serde(default)]
    pub image: String,
    /// Price of opening one case.
    pub price: FixedPoint,
    /// Items that can be drawn, in catalog order.
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Case {
    /// Total price of opening `quantity` cases.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::ArithmeticOverflow` if the total does not fit.
    pub fn total_price(&self, quantity: u32) -> EconomyResult<FixedPoint> {
        self.price.safe_mul_int(u64::from(quantity))
    }
}

/// A case's items partitioned by rarity.
///
/// Buckets keep the case's item order. Rarities are listed in order of first
/// appearance. A rarity the case does not hold has no bucket at all.
#[derive(Clone, Debug)]
pub struct ItemPool<'a> {
    buckets: Vec<(&'a RarityId, Vec<&'a Item>)>,
    index: HashMap<&'a RarityId, usize>,
    len: usize,
}

impl<'a> ItemPool<'a> {
    /// Groups items by rarity.
    #[must_use]
    pub fn index(items: &'a [Item]) -> Self {
        let mut buckets: Vec<(&'a RarityId, Vec<&'a Item>)> = Vec::new();
        let mut index: HashMap<&'a RarityId, usize> = HashMap::new();

        for item in items {
            let slot = *index.entry(&item.rarity).or_insert_with(|| {
                buckets.push((&item.rarity, Vec::new()));
                buckets.len() - 1
            });
            buckets[slot].1.push(item);
        }

        Self {
            buckets,
            index,
            len: items.len(),
        }
    }

    /// Items of one rarity, in case order. Empty if the case has none.
    #[must_use]
    pub fn bucket(&self, rarity: &RarityId) -> &[&'a Item] {
        match self.index.get(rarity) {
            Some(&slot) => self.buckets[slot].1.as_slice(),
            None => &[],
        }
    }

    /// Rarities present in the case, in order of first appearance.
    pub fn rarities(&self) -> impl Iterator<Item = &'a RarityId> + '_ {
        self.buckets.iter().map(|(rarity, _)| *rarity)
    }

    /// Total number of items indexed.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the case has nothing to draw.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The draw engine.
///
/// Holds the rarity table; everything per-request (pool, rng) is passed in.
#[derive(Clone, Debug, Default)]
pub struct DrawEngine {
    table: RarityTable,
}

impl DrawEngine {
    /// Creates an engine over a validated table.
    #[must_use]
    pub fn new(table: RarityTable) -> Self {
        Self { table }
    }

    /// The rarity table in use.
    #[must_use]
    pub fn table(&self) -> &RarityTable {
        &self.table
    }

    /// Maps a roll in `[0, 1)` to a rarity tier.
    #[must_use]
    pub fn select_rarity(&self, roll: f64) -> &RarityId {
        &self.table.select(roll).id
    }

    /// Draws one item.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::EmptyCase` if the pool has no items. Settlement
    /// rejects empty cases before drawing, so this only fires on misuse.
    pub fn draw<'a, R: Rng + ?Sized>(
        &self,
        pool: &ItemPool<'a>,
        rng: &mut R,
    ) -> EconomyResult<&'a Item> {
        if pool.is_empty() {
            return Err(EconomyError::EmptyCase);
        }

        let roll: f64 = rng.gen();
        let rarity = self.select_rarity(roll);

        if let Some(item) = pool.bucket(rarity).choose(rng) {
            return Ok(*item);
        }

        // Tier missing from this case: any present tier, equally likely.
        let (_, bucket) = pool
            .buckets
            .choose(rng)
            .ok_or(EconomyError::EmptyCase)?;
        bucket.choose(rng).copied().ok_or(EconomyError::EmptyCase)
    }

    /// Draws `count` independent items against the same pool.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::EmptyCase` if the pool has no items.
    pub fn draw_many<R: Rng + ?Sized>(
        &self,
        pool: &ItemPool<'_>,
        count: u32,
        rng: &mut R,
    ) -> EconomyResult<Vec<Item>> {
        (0..count)
            .map(|_| self.draw(pool, rng).cloned())
            .collect()
    }

    /// Runs repeated draws and tallies what came out.
    ///
    /// Used to verify observed frequencies against the configured table.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::EmptyCase` if the pool has no items.
    pub fn run_statistics<R: Rng + ?Sized>(
        &self,
        pool: &ItemPool<'_>,
        iterations: u64,
        rng: &mut R,
    ) -> EconomyResult<DrawStatistics> {
        let mut stats = DrawStatistics::new();
        for _ in 0..iterations {
            let item = self.draw(pool, rng)?;
            stats.record(item);
        }
        Ok(stats)
    }
}

/// Tally of draw outcomes.
#[derive(Clone, Debug, Default)]
pub struct DrawStatistics {
    /// Total number of draws performed.
    pub total_draws: u64,
    /// Draw counts by rarity tier.
    pub rarity_counts: HashMap<RarityId, u64>,
    /// Draw counts by item.
    pub item_counts: HashMap<ItemId, u64>,
}

impl DrawStatistics {
    /// Creates empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one outcome.
    pub fn record(&mut self, item: &Item) {
        self.total_draws += 1;
        *self.rarity_counts.entry(item.rarity.clone()).or_insert(0) += 1;
        *self.item_counts.entry(item.id.clone()).or_insert(0) += 1;
    }

    /// Folds another tally into this one.
    pub fn merge(&mut self, other: &Self) {
        self.total_draws += other.total_draws;
        for (rarity, count) in &other.rarity_counts {
            *self.rarity_counts.entry(rarity.clone()).or_insert(0) += count;
        }
        for (item, count) in &other.item_counts {
            *self.item_counts.entry(item.clone()).or_insert(0) += count;
        }
    }

    /// Observed share of draws that landed on `rarity`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn frequency(&self, rarity: &RarityId) -> f64 {
        if self.total_draws == 0 {
            return 0.0;
        }
        let hits = self.rarity_counts.get(rarity).copied().unwrap_or(0);
        hits as f64 / self.total_draws as f64
    }
}

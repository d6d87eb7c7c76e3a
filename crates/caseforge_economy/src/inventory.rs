//! # Inventory System
//!
//! Item definitions and a user's holdings.
//!
//! Holdings are an ordered list, most recent first. A batch of drawn items
//! lands at the front in the order it was drawn, ahead of everything the user
//! already owned.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fixed_point::FixedPoint;
use crate::rarity::RarityId;

/// Unique identifier for an item definition.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Creates an item id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// An item definition.
///
/// The same definition may appear in several cases; a user owns copies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier.
    pub id: ItemId,
    /// Rarity tier this item is drawn under.
    pub rarity: RarityId,
    /// Display name.
    pub name: String,
    /// Image URL or asset key.
    #[serde(default)]
    pub image: String,
    /// Market value.
    #[serde(default)]
    pub value: FixedPoint,
}

/// A user's holdings, most recent first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    items: Vec<Item>,
}

impl Inventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items held.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if nothing is held.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Holdings in order, most recent first.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Inserts a batch at the front, keeping the batch's own order.
    ///
    /// `[a, b]` prepended to `[x, y]` gives `[a, b, x, y]`.
    pub fn prepend(&mut self, batch: &[Item]) {
        self.items.splice(0..0, batch.iter().cloned());
    }
}

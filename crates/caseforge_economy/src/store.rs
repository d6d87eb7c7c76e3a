//! # Persistence Collaborators
//!
//! The economy never talks to a database directly. It reads cases through
//! [`CaseCatalog`] and reads/writes users through [`UserLedger`]. Settlement
//! calls `save_user` exactly once per successful opening, with the whole
//! updated record, so a ledger that saves records atomically gives atomic
//! settlements.
//!
//! [`MemoryStore`] implements both for tests, simulations and local runs.
//! It can be loaded from a TOML catalog where items are defined once and
//! cases reference them by id:
//!
//! ```toml
//! [[items]]
//! id = "glock-fade"
//! rarity = "4"
//! name = "Glock Fade"
//! value = 310.5
//!
//! [[cases]]
//! id = "chroma"
//! price = 2.5
//! items = ["glock-fade"]
//!
//! [[users]]
//! id = "u1"
//! username = "ana"
//! wallet_balance = 100
//! ```

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;

use crate::account::{User, UserId};
use crate::error::{EconomyError, EconomyResult};
use crate::fixed_point::FixedPoint;
use crate::inventory::{Item, ItemId};
use crate::loot::{Case, CaseId};

/// Failure reported by a persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct StoreError(String);

impl StoreError {
    /// Creates a store error with a diagnostic message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Read access to cases, with their items populated.
pub trait CaseCatalog: Send + Sync {
    /// Looks up a case. `Ok(None)` means it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing store fails.
    fn find_case_by_id(&self, id: &CaseId) -> Result<Option<Case>, StoreError>;
}

/// Read/write access to user records.
pub trait UserLedger: Send + Sync {
    /// Loads the latest persisted record. `Ok(None)` means no such user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing store fails.
    fn load_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// Replaces the persisted record in one write.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the record was not saved. The previous record
    /// must then still be intact.
    fn save_user(&self, user: &User) -> Result<(), StoreError>;
}

/// In-memory catalog and ledger.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cases: RwLock<HashMap<CaseId, Case>>,
    users: RwLock<HashMap<UserId, User>>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    cases: Vec<CaseEntry>,
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Deserialize)]
struct CaseEntry {
    id: CaseId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    image: String,
    price: FixedPoint,
    #[serde(default)]
    items: Vec<ItemId>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML catalog.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidConfig` on malformed TOML or when a case
    /// references an item that is not defined.
    pub fn from_toml_str(source: &str) -> EconomyResult<Self> {
        let file: CatalogFile =
            toml::from_str(source).map_err(|e| EconomyError::InvalidConfig(e.to_string()))?;

        let definitions: HashMap<&ItemId, &Item> =
            file.items.iter().map(|item| (&item.id, item)).collect();

        let store = Self::new();
        for entry in file.cases {
            let items = entry
                .items
                .iter()
                .map(|id| {
                    definitions.get(id).map(|item| (*item).clone()).ok_or_else(|| {
                        EconomyError::InvalidConfig(format!(
                            "case {} references unknown item {id}",
                            entry.id
                        ))
                    })
                })
                .collect::<EconomyResult<Vec<_>>>()?;

            store.insert_case(Case {
                id: entry.id,
                name: entry.name,
                image: entry.image,
                price: entry.price,
                items,
            });
        }
        for user in file.users {
            store.insert_user(user);
        }

        Ok(store)
    }

    /// Reads and parses a TOML catalog file.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::InvalidConfig` if the file cannot be read or parsed.
    pub fn from_toml(path: impl AsRef<Path>) -> EconomyResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| EconomyError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Adds or replaces a case.
    pub fn insert_case(&self, case: Case) {
        self.cases.write().insert(case.id.clone(), case);
    }

    /// Adds or replaces a user.
    pub fn insert_user(&self, user: User) {
        self.users.write().insert(user.id.clone(), user);
    }

    /// Snapshot of a user's current record.
    #[must_use]
    pub fn user(&self, id: &UserId) -> Option<User> {
        self.users.read().get(id).cloned()
    }

    /// Ids of every stored user.
    #[must_use]
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<_> = self.users.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids of every stored case.
    #[must_use]
    pub fn case_ids(&self) -> Vec<CaseId> {
        let mut ids: Vec<_> = self.cases.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl CaseCatalog for MemoryStore {
    fn find_case_by_id(&self, id: &CaseId) -> Result<Option<Case>, StoreError> {
        Ok(self.cases.read().get(id).cloned())
    }
}

impl UserLedger for MemoryStore {
    fn load_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.user(id))
    }

    fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.users.write().insert(user.id.clone(), user.clone());
        Ok(())
    }
}

//! # Settlement
//!
//! Turns an open-case request into one atomic change to a user record.
//!
//! ## Preconditions (first failure wins)
//!
//! 1. case exists, then user exists
//! 2. quantity is an integer
//! 3. quantity is at most the batch cap
//! 4. quantity is at least 1
//! 5. balance covers `price * quantity`
//! 6. the case has items
//!
//! Nothing is touched until all pass. The user record is read, checked,
//! drawn against and saved while holding that user's lock, so two openings by
//! the same user can never both spend the same balance. The new record is
//! built on a working copy and published with a single `save_user`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;
use tracing::{debug, info};

use crate::account::{User, UserId};
use crate::config::EconomyConfig;
use crate::error::{EconomyError, EconomyResult, ErrorKind, QuantityError};
use crate::fixed_point::FixedPoint;
use crate::inventory::Item;
use crate::leveling::LevelCurve;
use crate::loot::{Case, DrawEngine, ItemPool};
use crate::store::UserLedger;

/// A requested quantity, exactly as the caller sent it.
///
/// Validation follows JSON number semantics: `3` and `3.0` are the integer
/// three; `3.5`, `"3"`, `true`, `null` and a missing field are not integers.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantity(Value);

impl Quantity {
    /// Wraps a raw JSON value.
    #[must_use]
    pub const fn raw(value: Value) -> Self {
        Self(value)
    }

    /// Takes the `quantity` field of a request body. Missing becomes `null`.
    #[must_use]
    pub fn from_body(body: &Value) -> Self {
        Self(body.get("quantity").cloned().unwrap_or(Value::Null))
    }

    /// Checks the quantity against the batch cap.
    ///
    /// # Errors
    ///
    /// `NotInteger`, then `BatchTooLarge`, then `BelowMinimum`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn validate(&self, max_batch: u32) -> Result<u32, QuantityError> {
        let Value::Number(number) = &self.0 else {
            return Err(QuantityError::NotInteger);
        };

        let value: i128 = if let Some(n) = number.as_i64() {
            n.into()
        } else if let Some(n) = number.as_u64() {
            n.into()
        } else {
            match number.as_f64() {
                // Float-to-int casts saturate, which is all the range checks need.
                Some(f) if f.is_finite() && f.fract() == 0.0 => f as i128,
                _ => return Err(QuantityError::NotInteger),
            }
        };

        if value > i128::from(max_batch) {
            return Err(QuantityError::BatchTooLarge { max: max_batch });
        }
        if value < 1 {
            return Err(QuantityError::BelowMinimum);
        }
        u32::try_from(value).map_err(|_| QuantityError::BatchTooLarge { max: max_batch })
    }
}

impl From<u32> for Quantity {
    fn from(n: u32) -> Self {
        Self(n.into())
    }
}

impl From<i64> for Quantity {
    fn from(n: i64) -> Self {
        Self(n.into())
    }
}

impl From<f64> for Quantity {
    fn from(n: f64) -> Self {
        Self(n.into())
    }
}

/// One mutex per user id.
///
/// The map lock is only held long enough to find, create or retire a user's
/// lock. Entries live only while some settlement holds a handle to them.
#[derive(Debug, Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    /// Creates an empty lock map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock that serializes `user`'s settlements.
    #[must_use]
    pub fn lock_for(&self, user: &UserId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(user.clone()).or_default())
    }

    /// Hands back a lock taken with [`lock_for`](Self::lock_for), dropping
    /// the entry when no other settlement is holding or waiting on it.
    ///
    /// Clones are only made under the map lock, so a count of one here means
    /// nobody else can reach this entry.
    pub fn release(&self, user: &UserId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        drop(lock);
        if locks.get(user).is_some_and(|held| Arc::strong_count(held) == 1) {
            locks.remove(user);
        }
    }

    /// Number of users that have a lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// True if no user has settled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

/// A completed opening.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Opening {
    /// Items won, in draw order.
    pub items: Vec<Item>,
    /// The user record as saved.
    pub user: User,
    /// Total debited.
    pub spent: FixedPoint,
}

/// Validates and applies case openings.
#[derive(Debug)]
pub struct Settlement {
    engine: DrawEngine,
    curve: LevelCurve,
    max_batch: u32,
    locks: UserLocks,
}

impl Settlement {
    /// Creates a settlement stage.
    #[must_use]
    pub fn new(engine: DrawEngine, curve: LevelCurve, max_batch: u32) -> Self {
        Self {
            engine,
            curve,
            max_batch,
            locks: UserLocks::new(),
        }
    }

    /// Builds a settlement stage from loaded configuration.
    #[must_use]
    pub fn from_config(config: &EconomyConfig) -> Self {
        Self::new(
            DrawEngine::new(config.rarities.clone()),
            config.leveling.clone(),
            config.opening.max_batch,
        )
    }

    /// The draw engine in use.
    #[must_use]
    pub fn engine(&self) -> &DrawEngine {
        &self.engine
    }

    /// Most cases one request may open.
    #[must_use]
    pub fn max_batch(&self) -> u32 {
        self.max_batch
    }

    /// Opens `quantity` copies of `case` for `user_id`.
    ///
    /// `case` is `None` when the catalog had no such case; `user_id` is
    /// `None` for unauthenticated callers.
    ///
    /// # Errors
    ///
    /// Caller errors (`CaseNotFound`, `UserNotFound`, `Validation`,
    /// `InsufficientFunds`, `EmptyCase`) leave the ledger untouched. A ledger
    /// failure surfaces as `Store` and also leaves the saved record as it was.
    pub fn open_cases<R: Rng + ?Sized>(
        &self,
        ledger: &dyn UserLedger,
        user_id: Option<&UserId>,
        case: Option<&Case>,
        quantity: &Quantity,
        rng: &mut R,
    ) -> EconomyResult<Opening> {
        let result = match (case, user_id) {
            (Some(case), Some(user_id)) => {
                let lock = self.locks.lock_for(user_id);
                let result = {
                    let _guard = lock.lock();
                    self.settle(ledger, user_id, case, quantity, rng)
                };
                self.locks.release(user_id, lock);
                result
            }
            (None, _) => Err(EconomyError::CaseNotFound),
            (Some(_), None) => Err(EconomyError::UserNotFound),
        };
        if let Err(err) = &result {
            if err.kind() != ErrorKind::Internal {
                debug!(
                    user = ?user_id.map(UserId::to_string),
                    case = ?case.map(|c| c.id.to_string()),
                    reason = %err,
                    "opening rejected"
                );
            }
        }
        result
    }

    /// Runs the checks and the settlement. The caller holds `user_id`'s lock.
    fn settle<R: Rng + ?Sized>(
        &self,
        ledger: &dyn UserLedger,
        user_id: &UserId,
        case: &Case,
        quantity: &Quantity,
        rng: &mut R,
    ) -> EconomyResult<Opening> {
        let mut user = ledger
            .load_user(user_id)?
            .ok_or(EconomyError::UserNotFound)?;

        let quantity = quantity.validate(self.max_batch)?;
        // A total that overflows is more than any wallet can hold.
        let required = match case.total_price(quantity) {
            Ok(total) if total <= user.wallet_balance => total,
            total => {
                return Err(EconomyError::InsufficientFunds {
                    required: total.unwrap_or(FixedPoint::MAX),
                    available: user.wallet_balance,
                })
            }
        };
        if case.items.is_empty() {
            return Err(EconomyError::EmptyCase);
        }

        let pool = ItemPool::index(&case.items);
        let items = self.engine.draw_many(&pool, quantity, rng)?;

        user.wallet_balance = user.wallet_balance.safe_sub(required)?;
        user.inventory.prepend(&items);
        self.curve.update_level(&mut user, required);

        ledger.save_user(&user)?;

        info!(
            user = %user.id,
            case = %case.id,
            quantity,
            spent = %required,
            balance = %user.wallet_balance,
            "cases opened"
        );

        Ok(Opening {
            items,
            user,
            spent: required,
        })
    }
}

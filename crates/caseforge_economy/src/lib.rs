//! # CASEFORGE Economy
//!
//! Loot-case opening: weighted draws, atomic settlement and outcome fan-out.
//!
//! ## Design Principles
//!
//! 1. **Zero floating point in money** - Balances and prices are fixed-point (u64, 6 decimals)
//! 2. **Two-stage draw** - Rarity by global weight, then an item uniformly within the tier
//! 3. **Transactional settlement** - Validate everything, then one save of the whole record
//! 4. **Injected randomness** - One generator per request, seedable for tests
//! 5. **External configuration** - Rarity table, limits and leveling in TOML
//!
//! ## Thread Safety
//!
//! [`CaseHouse`] is `Send + Sync`. Openings by the same user serialize on a
//! per-user lock; different users never contend. Broadcasts run on their own
//! dispatcher thread after the user's lock is released.
//!
//! ## Example
//!
//! ```rust,ignore
//! use caseforge_economy::{Broadcaster, CaseHouse, EconomyConfig, HubTransport, MemoryStore, RngSource};
//!
//! let config = EconomyConfig::from_toml("data/config.toml")?;
//! let store = Arc::new(MemoryStore::from_toml("data/catalog.toml")?);
//! let hub = Arc::new(HubTransport::new());
//! let broadcaster = Arc::new(Broadcaster::new(hub.clone(), config.broadcast.queue_capacity));
//!
//! let house = CaseHouse::from_config(&config, store.clone(), store, broadcaster, RngSource::entropy());
//! let reply = house.open_case(Some(&user_id), &case_id, &json!({ "quantity": 3 }));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod account;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod fixed_point;
pub mod games;
pub mod inventory;
pub mod leveling;
pub mod loot;
pub mod rarity;
pub mod rng;
pub mod service;
pub mod settlement;
pub mod store;

pub use account::{User, UserId};
pub use broadcast::{
    Audience, BroadcastStats, Broadcaster, CaseOpenedPayload, EventTransport, HubTransport,
    OutboundEvent, PublicIdentity, TransportError, UserDataPayload, CASE_OPENED,
    USER_DATA_UPDATED,
};
pub use config::{BroadcastConfig, EconomyConfig, OpeningConfig};
pub use error::{EconomyError, EconomyResult, ErrorKind, QuantityError};
pub use fixed_point::FixedPoint;
pub use games::{GameError, GameReply, SlotGame, UpgradeGame, UpgradeRequest};
pub use inventory::{Inventory, Item, ItemId};
pub use leveling::LevelCurve;
pub use loot::{Case, CaseId, DrawEngine, DrawStatistics, ItemPool};
pub use rarity::{Rarity, RarityId, RarityTable};
pub use rng::RngSource;
pub use service::{CaseHouse, Reply};
pub use settlement::{Opening, Quantity, Settlement, UserLocks};
pub use store::{CaseCatalog, MemoryStore, StoreError, UserLedger};

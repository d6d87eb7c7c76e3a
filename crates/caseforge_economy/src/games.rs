//! Sub-game contracts.
//!
//! Upgrade and slots live outside this crate. The request surface only
//! authenticates, forwards and relays their replies.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::account::UserId;
use crate::broadcast::Broadcaster;
use crate::inventory::ItemId;

/// Reply from the upgrade game: a status code and the body to send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameReply {
    /// HTTP-style status.
    pub status: u16,
    /// Body relayed to the caller unchanged.
    pub payload: Value,
}

/// Failure raised by a sub-game. Its message is shown to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct GameError(pub String);

/// Trades a set of owned items for a chance at a target item.
pub trait UpgradeGame: Send + Sync {
    /// Runs one upgrade attempt.
    fn upgrade_items(&self, user: &UserId, selected: &[ItemId], target: &ItemId) -> GameReply;
}

/// Slot machine.
pub trait SlotGame: Send + Sync {
    /// Spins once. `bet` is passed through as the caller sent it; the game
    /// may publish its own events through `broadcaster`.
    ///
    /// # Errors
    ///
    /// Returns `GameError` for any failed spin.
    fn spin(&self, user: &UserId, bet: &Value, broadcaster: &Broadcaster) -> Result<Value, GameError>;
}

/// Body of an upgrade request.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRequest {
    /// Items offered.
    #[serde(default)]
    pub selected_item_ids: Vec<ItemId>,
    /// Item wanted.
    pub target_item_id: ItemId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upgrade_request_field_names() {
        let request: UpgradeRequest = serde_json::from_value(json!({
            "selectedItemIds": ["a", "b"],
            "targetItemId": "knife"
        }))
        .unwrap();
        assert_eq!(request.selected_item_ids, vec![ItemId::new("a"), ItemId::new("b")]);
        assert_eq!(request.target_item_id, ItemId::new("knife"));
    }

    #[test]
    fn test_upgrade_request_needs_target() {
        let parsed = serde_json::from_value::<UpgradeRequest>(json!({ "selectedItemIds": [] }));
        assert!(parsed.is_err());
    }
}

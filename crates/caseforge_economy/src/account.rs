//! User records as the economy sees them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::broadcast::{PublicIdentity, UserDataPayload};
use crate::fixed_point::FixedPoint;
use crate::inventory::Inventory;
use crate::leveling::FIRST_LEVEL;

/// Unique identifier for a user.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a user id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

const fn first_level() -> u32 {
    FIRST_LEVEL
}

/// A player's persisted record.
///
/// Only settlement mutates balance, xp, level and inventory during an opening.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Public display name.
    pub username: String,
    /// Avatar URL.
    #[serde(default)]
    pub profile_picture: String,
    /// Spendable currency. Unsigned, so it cannot go negative.
    pub wallet_balance: FixedPoint,
    /// Lifetime experience.
    #[serde(default)]
    pub xp: u64,
    /// Current level.
    #[serde(default = "first_level")]
    pub level: u32,
    /// Owned items, most recent first.
    #[serde(default)]
    pub inventory: Inventory,
}

impl User {
    /// Creates a fresh level-1 user with an empty inventory.
    #[must_use]
    pub fn new(id: impl Into<UserId>, username: impl Into<String>, wallet_balance: FixedPoint) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            profile_picture: String::new(),
            wallet_balance,
            xp: 0,
            level: FIRST_LEVEL,
            inventory: Inventory::new(),
        }
    }

    /// What spectators may see about this user.
    #[must_use]
    pub fn public_identity(&self) -> PublicIdentity {
        PublicIdentity {
            name: self.username.clone(),
            id: self.id.clone(),
            profile_picture: self.profile_picture.clone(),
        }
    }

    /// Private balance/progress update for this user's own channels.
    #[must_use]
    pub fn data_payload(&self) -> UserDataPayload {
        UserDataPayload {
            wallet_balance: self.wallet_balance,
            xp: self.xp,
            level: self.level,
        }
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_starts_at_first_level() {
        let user = User::new("u1", "ana", FixedPoint::from_whole(10));
        assert_eq!(user.level, FIRST_LEVEL);
        assert_eq!(user.xp, 0);
        assert!(user.inventory.is_empty());
    }

    #[test]
    fn test_catalog_defaults() {
        let user: User = toml::from_str(
            r#"
            id = "u7"
            username = "kai"
            wallet_balance = 250
            "#,
        )
        .unwrap();
        assert_eq!(user.level, FIRST_LEVEL);
        assert_eq!(user.wallet_balance, FixedPoint::from_whole(250));
    }

    #[test]
    fn test_public_identity_hides_balance() {
        let mut user = User::new("u1", "ana", FixedPoint::from_whole(10));
        user.profile_picture = "ana.png".into();
        let json = serde_json::to_value(user.public_identity()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "name": "ana", "id": "u1", "profilePicture": "ana.png" })
        );
    }
}

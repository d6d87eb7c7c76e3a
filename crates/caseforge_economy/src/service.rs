//! # Request Surface
//!
//! [`CaseHouse`] wires the catalog, the ledger, settlement, per-request
//! randomness, the broadcaster and the sub-games together behind three
//! endpoints. Each takes the authenticated user (if any) and a JSON body and
//! returns a status plus a JSON body.
//!
//! ```text
//! open_case:  catalog ──> settlement ──> caseOpened ──> reply ──> userDataUpdated
//! upgrade:    auth ──> UpgradeGame ──> reply (status + payload verbatim)
//! spin_slots: auth ──> SlotGame ──> reply (200 result | 500 message)
//! ```
//!
//! Internal failures are logged here and reach the caller only as
//! "Internal server error".

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::account::UserId;
use crate::broadcast::{Broadcaster, CaseOpenedPayload, CASE_OPENED, USER_DATA_UPDATED};
use crate::config::EconomyConfig;
use crate::error::{EconomyError, EconomyResult, ErrorKind};
use crate::games::{SlotGame, UpgradeGame, UpgradeRequest};
use crate::loot::CaseId;
use crate::rng::RngSource;
use crate::settlement::{Quantity, Settlement};
use crate::store::{CaseCatalog, UserLedger};

/// Status and JSON body returned to a caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    /// HTTP-style status.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl Reply {
    /// A 200 reply.
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// A `{ "message": ... }` reply.
    #[must_use]
    pub fn message(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "message": message.into() }),
        }
    }

    /// True for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<&EconomyError> for Reply {
    fn from(err: &EconomyError) -> Self {
        Self::message(err.status(), err.public_message())
    }
}

/// The case-opening service.
pub struct CaseHouse {
    catalog: Arc<dyn CaseCatalog>,
    ledger: Arc<dyn UserLedger>,
    settlement: Settlement,
    rng: RngSource,
    broadcaster: Arc<Broadcaster>,
    upgrade: Option<Arc<dyn UpgradeGame>>,
    slots: Option<Arc<dyn SlotGame>>,
}

impl std::fmt::Debug for CaseHouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseHouse")
            .field("settlement", &self.settlement)
            .field("rng", &self.rng)
            .field("broadcaster", &self.broadcaster)
            .field("upgrade", &self.upgrade.is_some())
            .field("slots", &self.slots.is_some())
            .finish_non_exhaustive()
    }
}

impl CaseHouse {
    /// Creates a service without sub-games.
    #[must_use]
    pub fn new(
        settlement: Settlement,
        catalog: Arc<dyn CaseCatalog>,
        ledger: Arc<dyn UserLedger>,
        broadcaster: Arc<Broadcaster>,
        rng: RngSource,
    ) -> Self {
        Self {
            catalog,
            ledger,
            settlement,
            rng,
            broadcaster,
            upgrade: None,
            slots: None,
        }
    }

    /// Creates a service from loaded configuration.
    #[must_use]
    pub fn from_config(
        config: &EconomyConfig,
        catalog: Arc<dyn CaseCatalog>,
        ledger: Arc<dyn UserLedger>,
        broadcaster: Arc<Broadcaster>,
        rng: RngSource,
    ) -> Self {
        Self::new(Settlement::from_config(config), catalog, ledger, broadcaster, rng)
    }

    /// Attaches the upgrade game.
    #[must_use]
    pub fn with_upgrade_game(mut self, game: Arc<dyn UpgradeGame>) -> Self {
        self.upgrade = Some(game);
        self
    }

    /// Attaches the slot game.
    #[must_use]
    pub fn with_slot_game(mut self, game: Arc<dyn SlotGame>) -> Self {
        self.slots = Some(game);
        self
    }

    /// The outcome broadcaster.
    #[must_use]
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// The settlement stage.
    #[must_use]
    pub fn settlement(&self) -> &Settlement {
        &self.settlement
    }

    /// `POST /openCase/:id` with body `{ "quantity": n }`.
    ///
    /// On success replies 200 `{ "items": [...] }`. The global `caseOpened`
    /// event is queued before the reply is built and the private
    /// `userDataUpdated` event after.
    pub fn open_case(&self, user: Option<&UserId>, case_id: &CaseId, body: &Value) -> Reply {
        self.try_open_case(user, case_id, body)
            .unwrap_or_else(|err| Self::reject(&err))
    }

    fn try_open_case(
        &self,
        user: Option<&UserId>,
        case_id: &CaseId,
        body: &Value,
    ) -> EconomyResult<Reply> {
        let case = self.catalog.find_case_by_id(case_id)?;
        let quantity = Quantity::from_body(body);
        let mut rng = self.rng.next_rng();

        let opening = self.settlement.open_cases(
            self.ledger.as_ref(),
            user,
            case.as_ref(),
            &quantity,
            &mut rng,
        )?;

        let case_image = case.map(|c| c.image).unwrap_or_default();
        self.broadcaster.publish_global(
            CASE_OPENED,
            &CaseOpenedPayload {
                winning_items: opening.items.clone(),
                user: opening.user.public_identity(),
                case_image,
            },
        );

        let reply = Reply::ok(json!({ "items": opening.items }));

        self.broadcaster.publish_to_user(
            &opening.user.id,
            USER_DATA_UPDATED,
            &opening.user.data_payload(),
        );

        Ok(reply)
    }

    /// `POST /upgrade` with body `{ "selectedItemIds": [...], "targetItemId": id }`.
    ///
    /// Relays the game's status and payload unchanged.
    pub fn upgrade(&self, user: Option<&UserId>, body: &Value) -> Reply {
        let Some(user) = user else {
            return Self::reject(&EconomyError::UserNotFound);
        };
        let request = match UpgradeRequest::deserialize(body) {
            Ok(request) => request,
            Err(err) => {
                warn!(user = %user, error = %err, "malformed upgrade request");
                return Reply::message(400, "Invalid upgrade request");
            }
        };
        let Some(game) = &self.upgrade else {
            return Self::reject(&EconomyError::Internal("no upgrade game attached".into()));
        };

        let reply = game.upgrade_items(user, &request.selected_item_ids, &request.target_item_id);
        Reply {
            status: reply.status,
            body: reply.payload,
        }
    }

    /// `POST /slots` with body `{ "betAmount": ... }`.
    ///
    /// The bet is forwarded as sent. A game failure replies 500 with the
    /// game's own message.
    pub fn spin_slots(&self, user: Option<&UserId>, body: &Value) -> Reply {
        let Some(user) = user else {
            return Self::reject(&EconomyError::UserNotFound);
        };
        let Some(game) = &self.slots else {
            return Self::reject(&EconomyError::Internal("no slot game attached".into()));
        };

        let bet = body.get("betAmount").unwrap_or(&Value::Null);
        match game.spin(user, bet, &self.broadcaster) {
            Ok(result) => Reply::ok(result),
            Err(err) => {
                warn!(user = %user, error = %err, "slot spin failed");
                Reply::message(500, err.to_string())
            }
        }
    }

    fn reject(err: &EconomyError) -> Reply {
        if err.kind() == ErrorKind::Internal {
            error!(error = %err, "request failed");
        }
        Reply::from(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::User;
    use crate::broadcast::HubTransport;
    use crate::fixed_point::FixedPoint;
    use crate::games::{GameError, GameReply};
    use crate::inventory::{Item, ItemId};
    use crate::loot::Case;
    use crate::rarity::RarityId;
    use crate::store::MemoryStore;

    fn house() -> (Arc<MemoryStore>, CaseHouse) {
        let store = Arc::new(MemoryStore::new());
        store.insert_case(Case {
            id: CaseId::new("chroma"),
            name: "Chroma".into(),
            image: "chroma.png".into(),
            price: FixedPoint::from_whole(10),
            items: vec![Item {
                id: ItemId::new("p90"),
                rarity: RarityId::new("1"),
                name: "P90".into(),
                image: String::new(),
                value: FixedPoint::ONE,
            }],
        });
        store.insert_user(User::new("u1", "ana", FixedPoint::from_whole(25)));

        let broadcaster = Arc::new(Broadcaster::new(Arc::new(HubTransport::new()), 16));
        let house = CaseHouse::from_config(
            &EconomyConfig::default(),
            store.clone(),
            store.clone(),
            broadcaster,
            RngSource::seeded(1),
        );
        (store, house)
    }

    #[test]
    fn test_open_case_replies_with_items() {
        let (store, house) = house();
        let reply = house.open_case(
            Some(&UserId::new("u1")),
            &CaseId::new("chroma"),
            &json!({ "quantity": 2 }),
        );

        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["items"].as_array().unwrap().len(), 2);
        assert_eq!(reply.body["items"][0]["id"], "p90");
        let user = store.user(&UserId::new("u1")).unwrap();
        assert_eq!(user.wallet_balance, FixedPoint::from_whole(5));
    }

    #[test]
    fn test_error_replies() {
        let (_, house) = house();
        let u1 = UserId::new("u1");
        let chroma = CaseId::new("chroma");

        let cases = [
            (None, "nope", json!({ "quantity": 1 }), 404, "Case not found"),
            (None, "chroma", json!({ "quantity": 1 }), 404, "User not found"),
            (Some(&u1), "chroma", json!({ "quantity": "2" }), 400, "Quantity to open must be an integer"),
            (Some(&u1), "chroma", json!({ "quantity": 6 }), 400, "You can only open up to 5 cases at a time"),
            (Some(&u1), "chroma", json!({ "quantity": 0 }), 400, "You need to open at least 1 case"),
            (Some(&u1), "chroma", json!({ "quantity": 3 }), 400, "Insufficient balance"),
        ];
        for (user, case, body, status, message) in cases {
            let reply = house.open_case(user, &CaseId::new(case), &body);
            assert_eq!(reply, Reply::message(status, message), "case {case} body {body}");
        }

        assert_eq!(house.open_case(Some(&u1), &chroma, &json!({ "quantity": 1 })).status, 200);
    }

    struct CoinFlip;

    impl UpgradeGame for CoinFlip {
        fn upgrade_items(&self, _: &UserId, selected: &[ItemId], target: &ItemId) -> GameReply {
            GameReply {
                status: 201,
                payload: json!({ "spent": selected.len(), "target": target }),
            }
        }
    }

    impl SlotGame for CoinFlip {
        fn spin(&self, _: &UserId, bet: &Value, _: &Broadcaster) -> Result<Value, GameError> {
            match bet.as_u64() {
                Some(amount) => Ok(json!({ "won": amount * 2 })),
                None => Err(GameError("Invalid bet".into())),
            }
        }
    }

    #[test]
    fn test_sub_games_need_a_user() {
        let (_, house) = house();
        let house = house
            .with_upgrade_game(Arc::new(CoinFlip))
            .with_slot_game(Arc::new(CoinFlip));

        assert_eq!(house.upgrade(None, &json!({})), Reply::message(404, "User not found"));
        assert_eq!(house.spin_slots(None, &json!({})), Reply::message(404, "User not found"));
    }

    #[test]
    fn test_upgrade_relays_game_reply() {
        let (_, house) = house();
        let house = house.with_upgrade_game(Arc::new(CoinFlip));
        let reply = house.upgrade(
            Some(&UserId::new("u1")),
            &json!({ "selectedItemIds": ["a", "b"], "targetItemId": "knife" }),
        );
        assert_eq!(reply.status, 201);
        assert_eq!(reply.body, json!({ "spent": 2, "target": "knife" }));

        let reply = house.upgrade(Some(&UserId::new("u1")), &json!({ "selectedItemIds": 3 }));
        assert_eq!(reply.status, 400);
    }

    #[test]
    fn test_slots_pass_through_result_and_error_message() {
        let (_, house) = house();
        let house = house.with_slot_game(Arc::new(CoinFlip));
        let u1 = UserId::new("u1");

        assert_eq!(
            house.spin_slots(Some(&u1), &json!({ "betAmount": 4 })),
            Reply::ok(json!({ "won": 8 }))
        );
        assert_eq!(
            house.spin_slots(Some(&u1), &json!({ "betAmount": "lots" })),
            Reply::message(500, "Invalid bet")
        );
    }

    #[test]
    fn test_missing_sub_game_is_internal() {
        let (_, house) = house();
        let reply = house.spin_slots(Some(&UserId::new("u1")), &json!({}));
        assert_eq!(reply, Reply::message(500, "Internal server error"));
    }
}

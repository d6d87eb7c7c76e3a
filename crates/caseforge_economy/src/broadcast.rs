//! # Outcome Broadcaster
//!
//! Fans settlement outcomes out to spectators and to the opener's own
//! sessions without holding up the response.
//!
//! ```text
//! open_case ──> publish(caseOpened) ──┐
//!     │                               ▼
//!     ├──> reply to caller     [bounded queue] ──> dispatcher thread ──> EventTransport
//!     │                               ▲
//!     └──> publish(userDataUpdated) ──┘
//! ```
//!
//! Delivery is best-effort. A full queue or a failing transport drops the
//! event with a warning; it never fails the settlement that produced it.
//! Events are delivered in the order they were queued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::account::UserId;
use crate::fixed_point::FixedPoint;
use crate::inventory::Item;

/// Global feed event announcing an opening.
pub const CASE_OPENED: &str = "caseOpened";

/// Private event carrying the opener's new balance and progress.
pub const USER_DATA_UPDATED: &str = "userDataUpdated";

/// What spectators may see about a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIdentity {
    /// Display name.
    pub name: String,
    /// User id.
    pub id: UserId,
    /// Avatar URL.
    pub profile_picture: String,
}

/// Private balance/progress update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataPayload {
    /// Balance after settlement.
    pub wallet_balance: FixedPoint,
    /// Lifetime xp after settlement.
    pub xp: u64,
    /// Level after settlement.
    pub level: u32,
}

/// Payload of [`CASE_OPENED`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseOpenedPayload {
    /// Items won, in draw order.
    pub winning_items: Vec<Item>,
    /// Who opened the case.
    pub user: PublicIdentity,
    /// Image of the opened case.
    pub case_image: String,
}

/// Who receives an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Audience {
    /// Every connected observer.
    Everyone,
    /// Only the sessions of one user.
    User(UserId),
}

/// An event on its way to a transport.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundEvent {
    /// Recipients.
    pub audience: Audience,
    /// Event name, e.g. [`CASE_OPENED`].
    pub name: String,
    /// JSON payload.
    pub payload: Value,
}

/// Failure reported by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Real-time push channel the dispatcher writes to.
pub trait EventTransport: Send + Sync + 'static {
    /// Sends an event to every observer.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the event could not be sent.
    fn emit_global(&self, name: &str, payload: &Value) -> Result<(), TransportError>;

    /// Sends an event to one user's sessions.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the event could not be sent.
    fn emit_to_user(&self, user: &UserId, name: &str, payload: &Value)
        -> Result<(), TransportError>;
}

/// In-process pub/sub hub.
///
/// Observers subscribe to the global feed or join a user's room and get a
/// channel receiver. Receivers that were dropped are pruned on the next send.
#[derive(Debug, Default)]
pub struct HubTransport {
    global: Mutex<Vec<Sender<OutboundEvent>>>,
    rooms: Mutex<HashMap<UserId, Vec<Sender<OutboundEvent>>>>,
}

impl HubTransport {
    /// Creates a hub with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the global feed.
    #[must_use]
    pub fn subscribe_global(&self) -> Receiver<OutboundEvent> {
        let (tx, rx) = unbounded();
        self.global.lock().push(tx);
        rx
    }

    /// Joins a user's private room.
    #[must_use]
    pub fn join_room(&self, user: &UserId) -> Receiver<OutboundEvent> {
        let (tx, rx) = unbounded();
        self.rooms.lock().entry(user.clone()).or_default().push(tx);
        rx
    }

    fn fan_out(subscribers: &mut Vec<Sender<OutboundEvent>>, event: &OutboundEvent) {
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl EventTransport for HubTransport {
    fn emit_global(&self, name: &str, payload: &Value) -> Result<(), TransportError> {
        let event = OutboundEvent {
            audience: Audience::Everyone,
            name: name.to_owned(),
            payload: payload.clone(),
        };
        Self::fan_out(&mut self.global.lock(), &event);
        Ok(())
    }

    fn emit_to_user(
        &self,
        user: &UserId,
        name: &str,
        payload: &Value,
    ) -> Result<(), TransportError> {
        let event = OutboundEvent {
            audience: Audience::User(user.clone()),
            name: name.to_owned(),
            payload: payload.clone(),
        };
        let mut rooms = self.rooms.lock();
        if let Some(room) = rooms.get_mut(user) {
            Self::fan_out(room, &event);
            if room.is_empty() {
                rooms.remove(user);
            }
        }
        Ok(())
    }
}

/// Delivery counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Events handed to the transport successfully.
    pub delivered: u64,
    /// Events dropped (queue full, stopped, or transport failure).
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

enum Command {
    Deliver(OutboundEvent),
    Flush(Sender<()>),
    Shutdown,
}

/// Queue plus dispatcher thread in front of an [`EventTransport`].
pub struct Broadcaster {
    queue: Sender<Command>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("queued", &self.queue.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Broadcaster {
    /// Starts a dispatcher thread draining a queue of `capacity` events.
    #[must_use]
    pub fn new(transport: Arc<dyn EventTransport>, capacity: usize) -> Self {
        let (queue, commands) = bounded(capacity.max(1));
        let counters = Arc::new(Counters::default());

        let dispatcher_counters = Arc::clone(&counters);
        let handle = thread::spawn(move || {
            Self::dispatch_loop(&commands, transport.as_ref(), &dispatcher_counters);
        });

        Self {
            queue,
            dispatcher: Mutex::new(Some(handle)),
            counters,
        }
    }

    fn dispatch_loop(
        commands: &Receiver<Command>,
        transport: &dyn EventTransport,
        counters: &Counters,
    ) {
        for command in commands {
            match command {
                Command::Deliver(event) => {
                    let sent = match &event.audience {
                        Audience::Everyone => transport.emit_global(&event.name, &event.payload),
                        Audience::User(user) => {
                            transport.emit_to_user(user, &event.name, &event.payload)
                        }
                    };
                    match sent {
                        Ok(()) => {
                            counters.delivered.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            counters.dropped.fetch_add(1, Ordering::Relaxed);
                            warn!(event = %event.name, error = %err, "broadcast dropped");
                        }
                    }
                }
                Command::Flush(ack) => {
                    let _ = ack.send(());
                }
                Command::Shutdown => break,
            }
        }
        debug!("broadcast dispatcher stopped");
    }

    /// Queues an event without blocking. Dropped with a warning if the queue
    /// is full or the dispatcher has stopped.
    pub fn publish(&self, event: OutboundEvent) {
        match self.queue.try_send(Command::Deliver(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(Command::Deliver(event))) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(event = %event.name, "broadcast queue full, event dropped");
            }
            Err(_) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("broadcaster stopped, event dropped");
            }
        }
    }

    /// Queues a serializable payload for every observer.
    pub fn publish_global<T: Serialize>(&self, name: &str, payload: &T) {
        self.publish_serialized(Audience::Everyone, name, payload);
    }

    /// Queues a serializable payload for one user's room.
    pub fn publish_to_user<T: Serialize>(&self, user: &UserId, name: &str, payload: &T) {
        self.publish_serialized(Audience::User(user.clone()), name, payload);
    }

    fn publish_serialized<T: Serialize>(&self, audience: Audience, name: &str, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(payload) => self.publish(OutboundEvent {
                audience,
                name: name.to_owned(),
                payload,
            }),
            Err(err) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(event = name, error = %err, "broadcast payload not serializable");
            }
        }
    }

    /// Blocks until every event queued before this call has been handed to
    /// the transport. Returns immediately once the dispatcher has stopped.
    pub fn flush(&self) {
        let (ack, done) = bounded(1);
        if self.queue.send(Command::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    /// Delivers what is already queued, then stops the dispatcher.
    /// Later publishes are dropped. Safe to call more than once.
    pub fn shutdown(&self) {
        let Some(handle) = self.dispatcher.lock().take() else {
            return;
        };
        let _ = self.queue.send(Command::Shutdown);
        if handle.join().is_err() {
            warn!("broadcast dispatcher panicked");
        }
    }

    /// Delivery counters so far.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hub_broadcaster(capacity: usize) -> (Arc<HubTransport>, Broadcaster) {
        let hub = Arc::new(HubTransport::new());
        let broadcaster = Broadcaster::new(hub.clone(), capacity);
        (hub, broadcaster)
    }

    #[test]
    fn test_global_reaches_every_subscriber() {
        let (hub, broadcaster) = hub_broadcaster(16);
        let a = hub.subscribe_global();
        let b = hub.subscribe_global();

        broadcaster.publish_global(CASE_OPENED, &json!({ "n": 1 }));
        broadcaster.flush();

        for rx in [a, b] {
            let event = rx.try_recv().unwrap();
            assert_eq!(event.name, CASE_OPENED);
            assert_eq!(event.audience, Audience::Everyone);
            assert_eq!(event.payload, json!({ "n": 1 }));
        }
        assert_eq!(broadcaster.stats().delivered, 1);
    }

    #[test]
    fn test_room_events_stay_private() {
        let (hub, broadcaster) = hub_broadcaster(16);
        let ana = UserId::new("ana");
        let kai = UserId::new("kai");
        let ana_room = hub.join_room(&ana);
        let kai_room = hub.join_room(&kai);
        let feed = hub.subscribe_global();

        broadcaster.publish_to_user(&ana, USER_DATA_UPDATED, &json!({ "xp": 3 }));
        broadcaster.flush();

        assert_eq!(ana_room.try_recv().unwrap().audience, Audience::User(ana));
        assert!(kai_room.try_recv().is_err());
        assert!(feed.try_recv().is_err());
    }

    #[test]
    fn test_delivery_preserves_queue_order() {
        let (hub, broadcaster) = hub_broadcaster(64);
        let feed = hub.subscribe_global();

        for n in 0..20 {
            broadcaster.publish_global("tick", &n);
        }
        broadcaster.flush();

        let seen: Vec<_> = feed.try_iter().map(|e| e.payload).collect();
        let expected: Vec<_> = (0..20).map(|n| json!(n)).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let (hub, broadcaster) = hub_broadcaster(16);
        drop(hub.subscribe_global());
        let live = hub.subscribe_global();

        broadcaster.publish_global("ping", &json!(null));
        broadcaster.flush();

        assert!(live.try_recv().is_ok());
        assert_eq!(hub.global.lock().len(), 1);
    }

    struct GatedTransport {
        entered: Sender<()>,
        gate: Receiver<()>,
    }

    impl EventTransport for GatedTransport {
        fn emit_global(&self, _: &str, _: &Value) -> Result<(), TransportError> {
            let _ = self.entered.send(());
            let _ = self.gate.recv();
            Ok(())
        }

        fn emit_to_user(&self, _: &UserId, name: &str, payload: &Value) -> Result<(), TransportError> {
            self.emit_global(name, payload)
        }
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let (entered_tx, entered_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        let transport = Arc::new(GatedTransport {
            entered: entered_tx,
            gate: gate_rx,
        });
        let broadcaster = Broadcaster::new(transport, 1);

        broadcaster.publish_global("a", &1);
        entered_rx.recv().unwrap();
        broadcaster.publish_global("b", &2);
        broadcaster.publish_global("c", &3);
        assert_eq!(broadcaster.stats().dropped, 1);

        drop(gate_tx);
        broadcaster.flush();
        assert_eq!(
            broadcaster.stats(),
            BroadcastStats {
                delivered: 2,
                dropped: 1
            }
        );
    }

    struct BrokenTransport;

    impl EventTransport for BrokenTransport {
        fn emit_global(&self, _: &str, _: &Value) -> Result<(), TransportError> {
            Err(TransportError("socket closed".into()))
        }

        fn emit_to_user(&self, _: &UserId, _: &str, _: &Value) -> Result<(), TransportError> {
            Err(TransportError("socket closed".into()))
        }
    }

    #[test]
    fn test_transport_failures_are_counted_not_raised() {
        let broadcaster = Broadcaster::new(Arc::new(BrokenTransport), 8);
        broadcaster.publish_global(CASE_OPENED, &json!({}));
        broadcaster.publish_to_user(&UserId::new("u1"), USER_DATA_UPDATED, &json!({}));
        broadcaster.flush();
        assert_eq!(broadcaster.stats().dropped, 2);
    }

    #[test]
    fn test_shutdown_delivers_backlog_then_drops() {
        let (hub, broadcaster) = hub_broadcaster(16);
        let feed = hub.subscribe_global();

        broadcaster.publish_global("before", &0);
        broadcaster.shutdown();
        broadcaster.shutdown();
        broadcaster.publish_global("after", &1);
        broadcaster.flush();

        let names: Vec<_> = feed.try_iter().map(|e| e.name).collect();
        assert_eq!(names, ["before"]);
        assert_eq!(broadcaster.stats().dropped, 1);
    }

    #[test]
    fn test_payload_field_names() {
        let payload = CaseOpenedPayload {
            winning_items: Vec::new(),
            user: PublicIdentity {
                name: "ana".into(),
                id: UserId::new("u1"),
                profile_picture: String::new(),
            },
            case_image: "chroma.png".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("winningItems").is_some());
        assert!(json.get("caseImage").is_some());

        let data = UserDataPayload {
            wallet_balance: FixedPoint::from_whole(5),
            xp: 10,
            level: 2,
        };
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({ "walletBalance": 5, "xp": 10, "level": 2 })
        );
    }
}

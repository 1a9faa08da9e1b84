//! Typed publish/subscribe registry (§4.3). `Publish` clones the current
//! handler list for the event's kind and releases the lock before calling
//! any of them, so handlers are free to `Subscribe`/`Publish` themselves
//! without deadlocking the bus (they must still not re-enter the
//! simulation's write lock — see `simulation::Simulation`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::spatial::EntityRef;

#[derive(Debug, Clone)]
pub enum Event {
    ShipCreated { ship_id: u64, team_id: i64 },
    ShipDestroyed { ship_id: u64, team_id: i64 },
    PlanetCaptured { planet_id: u64, new_team: i64, old_team: i64 },
    ProjectileFired { projectile_id: u64, owner_ship_id: u64 },
    EntityCollision { a: EntityRef, b: EntityRef },
    PlayerJoined { player_id: u64, team_id: i64 },
    PlayerLeft { player_id: u64, team_id: i64 },
    GameStarted,
    GameEnded { winning_team: Option<i64> },
    TeamScoreChanged { team_id: i64, score: i64 },
    ChatMessageReceived { player_id: u64, message: String },
    ClientDisconnected { session_id: u64 },
    ClientReconnected { session_id: u64 },
    ClientReconnectFailed { session_id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ShipCreated,
    ShipDestroyed,
    PlanetCaptured,
    ProjectileFired,
    EntityCollision,
    PlayerJoined,
    PlayerLeft,
    GameStarted,
    GameEnded,
    TeamScoreChanged,
    ChatMessageReceived,
    ClientDisconnected,
    ClientReconnected,
    ClientReconnectFailed,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ShipCreated { .. } => EventKind::ShipCreated,
            Event::ShipDestroyed { .. } => EventKind::ShipDestroyed,
            Event::PlanetCaptured { .. } => EventKind::PlanetCaptured,
            Event::ProjectileFired { .. } => EventKind::ProjectileFired,
            Event::EntityCollision { .. } => EventKind::EntityCollision,
            Event::PlayerJoined { .. } => EventKind::PlayerJoined,
            Event::PlayerLeft { .. } => EventKind::PlayerLeft,
            Event::GameStarted => EventKind::GameStarted,
            Event::GameEnded { .. } => EventKind::GameEnded,
            Event::TeamScoreChanged { .. } => EventKind::TeamScoreChanged,
            Event::ChatMessageReceived { .. } => EventKind::ChatMessageReceived,
            Event::ClientDisconnected { .. } => EventKind::ClientDisconnected,
            Event::ClientReconnected { .. } => EventKind::ClientReconnected,
            Event::ClientReconnectFailed { .. } => EventKind::ClientReconnectFailed,
        }
    }
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Entry {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    handlers: Mutex<HashMap<EventKind, Vec<Entry>>>,
}

/// A cancellable subscription. Dropping it does not unsubscribe; call
/// [`Subscription::cancel`] explicitly.
pub struct Subscription {
    id: u64,
    kind: EventKind,
    bus: Weak<Inner>,
}

impl Subscription {
    pub fn cancel(self) {
        if let Some(inner) = self.bus.upgrade() {
            let mut handlers = inner.handlers.lock().unwrap();
            if let Some(entries) = handlers.get_mut(&self.kind) {
                entries.retain(|e| e.id != self.id);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Appends `handler` for `kind`. The returned subscription's `cancel`
    /// removes exactly this handler.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let mut handlers = self.inner.handlers.lock().unwrap();
        handlers.entry(kind).or_default().push(Entry {
            id,
            handler: Arc::new(handler),
        });
        Subscription {
            id,
            kind,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Invokes every current handler for `event.kind()`, in subscription
    /// order, without holding the bus lock.
    pub fn publish(&self, event: &Event) {
        let kind = event.kind();
        let snapshot: Vec<Handler> = {
            let handlers = self.inner.handlers.lock().unwrap();
            match handlers.get(&kind) {
                Some(entries) => entries.iter().map(|e| e.handler.clone()).collect(),
                None => return,
            }
        };
        for handler in snapshot {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn publish_invokes_subscribers_in_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        bus.subscribe(EventKind::GameStarted, move |_| o1.lock().unwrap().push(1));
        let o2 = order.clone();
        bus.subscribe(EventKind::GameStarted, move |_| o2.lock().unwrap().push(2));
        bus.publish(&Event::GameStarted);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn cancel_removes_exactly_that_handler() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        let sub1 = bus.subscribe(EventKind::GameStarted, move |_| {
            c1.fetch_add(1, Ordering::Relaxed);
        });
        let c2 = count.clone();
        bus.subscribe(EventKind::GameStarted, move |_| {
            c2.fetch_add(10, Ordering::Relaxed);
        });
        sub1.cancel();
        bus.publish(&Event::GameStarted);
        assert_eq!(count.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn publish_with_no_subscribers_is_a_noop() {
        let bus = EventBus::new();
        bus.publish(&Event::GameStarted);
    }
}

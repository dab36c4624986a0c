//! Type-keyed publish/subscribe registry
//!
//! One `EventBus` instance is created by the composition root and shared as
//! `Arc<EventBus>` with every component that publishes or listens. Delivery
//! iterates a snapshot of the subscriber list taken when `publish` starts, so
//! handlers may subscribe or unsubscribe while an event is being dispatched
//! without affecting that dispatch.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;

/// Marker for types that can travel over the bus
pub trait Event: Any + Send + Sync {}

/// Enemies removed by one population sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnemyDeathBatch {
    pub total_experience: u32,
    pub total_kills: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerHit {
    pub damage: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerDeath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerLevelUp {
    pub level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameStarted;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameEnded;

/// A wave's pre-delay elapsed and its spawn window opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveStarted {
    pub wave_index: usize,
}

/// A wave stopped emitting enemies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveSpawnWindowClosed {
    pub wave_index: usize,
    pub spawned: usize,
}

/// Every enemy of a wave has been removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveCleared {
    pub wave_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllWavesCompleted {
    pub waves: usize,
}

impl Event for EnemyDeathBatch {}
impl Event for PlayerHit {}
impl Event for PlayerDeath {}
impl Event for PlayerLevelUp {}
impl Event for GameStarted {}
impl Event for GameEnded {}
impl Event for WaveStarted {}
impl Event for WaveSpawnWindowClosed {}
impl Event for WaveCleared {}
impl Event for AllWavesCompleted {}

/// Identity of a registered handler, used to unsubscribe it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

struct Listener {
    id: SubscriptionId,
    handler: Handler,
}

/// Publish/subscribe registry keyed by event type
pub struct EventBus {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<TypeId, Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler for events of type `E`
    pub fn subscribe<E, F>(&self, handler: F) -> SubscriptionId
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler = Arc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });

        self.listeners
            .write()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Listener { id, handler });
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        for list in listeners.values_mut() {
            if let Some(pos) = list.iter().position(|l| l.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver `event` to every handler registered for `E` at call time.
    /// Returns the number of handlers invoked.
    pub fn publish<E: Event>(&self, event: E) -> usize {
        let snapshot: SmallVec<[Handler; 4]> = {
            let listeners = self.listeners.read();
            match listeners.get(&TypeId::of::<E>()) {
                Some(list) => list.iter().map(|l| Arc::clone(&l.handler)).collect(),
                None => return 0,
            }
        };

        let event: &dyn Any = &event;
        for handler in &snapshot {
            handler(event);
        }
        snapshot.len()
    }

    /// Handlers currently registered for `E`
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.listeners
            .read()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("EventBus")
            .field("event_types", &listeners.len())
            .field("handlers", &listeners.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_publish_reaches_only_matching_type() {
        let bus = EventBus::new();
        let xp = Arc::new(AtomicU32::new(0));
        let levels = Arc::new(AtomicU32::new(0));

        let xp_clone = xp.clone();
        bus.subscribe(move |e: &EnemyDeathBatch| {
            xp_clone.fetch_add(e.total_experience, Ordering::SeqCst);
        });
        let levels_clone = levels.clone();
        bus.subscribe(move |_: &PlayerLevelUp| {
            levels_clone.fetch_add(1, Ordering::SeqCst);
        });

        let delivered = bus.publish(EnemyDeathBatch {
            total_experience: 60,
            total_kills: 3,
        });
        assert_eq!(delivered, 1);
        assert_eq!(xp.load(Ordering::SeqCst), 60);
        assert_eq!(levels.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(GameStarted), 0);
    }

    #[test]
    fn test_unsubscribe_by_identity() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU32::new(0));

        let a = {
            let hits = hits.clone();
            bus.subscribe(move |_: &PlayerHit| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let _b = {
            let hits = hits.clone();
            bus.subscribe(move |_: &PlayerHit| {
                hits.fetch_add(10, Ordering::SeqCst);
            })
        };

        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));
        bus.publish(PlayerHit { damage: 1.0 });
        assert_eq!(hits.load(Ordering::SeqCst), 10);
        assert_eq!(bus.subscriber_count::<PlayerHit>(), 1);
    }

    #[test]
    fn test_subscribe_during_dispatch_waits_for_next_publish() {
        let bus = Arc::new(EventBus::new());
        let late_calls = Arc::new(AtomicU32::new(0));

        let bus_in_handler = Arc::clone(&bus);
        let late_in_handler = Arc::clone(&late_calls);
        bus.subscribe(move |_: &GameStarted| {
            let late = Arc::clone(&late_in_handler);
            bus_in_handler.subscribe(move |_: &GameStarted| {
                late.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(bus.publish(GameStarted), 1);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        // The handler registered during the first dispatch sees this one
        assert_eq!(bus.publish(GameStarted), 2);
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_still_delivers_current_event() {
        let bus = Arc::new(EventBus::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let second_id = Arc::new(Mutex::new(None));

        {
            let bus_in_handler = Arc::clone(&bus);
            let order = Arc::clone(&order);
            let second_id = Arc::clone(&second_id);
            bus.subscribe(move |_: &GameEnded| {
                order.lock().push("first");
                if let Some(id) = *second_id.lock() {
                    bus_in_handler.unsubscribe(id);
                }
            });
        }
        {
            let order = Arc::clone(&order);
            let id = bus.subscribe(move |_: &GameEnded| {
                order.lock().push("second");
            });
            *second_id.lock() = Some(id);
        }

        assert_eq!(bus.publish(GameEnded), 2);
        assert_eq!(*order.lock(), vec!["first", "second"]);

        assert_eq!(bus.publish(GameEnded), 1);
        assert_eq!(*order.lock(), vec!["first", "second", "first"]);
    }
}

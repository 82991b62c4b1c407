//! Publish/subscribe dispatch of stream events.
//!
//! Each [`EventKind`] is a channel holding an ordered list of handlers.
//! Handlers run synchronously inside [`EventBus::emit`], in subscription
//! order. A handler removed while an event is being delivered is skipped
//! for the rest of that delivery.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::events::{EventKind, StreamEvent};

/// Event callback
pub type Handler = Arc<dyn Fn(&StreamEvent) + Send + Sync>;

#[derive(Default)]
struct Channels {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(u64, Handler)>>,
}

impl Channels {
    fn contains(&self, kind: EventKind, id: u64) -> bool {
        self.handlers
            .get(&kind)
            .is_some_and(|list| list.iter().any(|(hid, _)| *hid == id))
    }
}

/// Named-channel event bus
#[derive(Clone, Default)]
pub struct EventBus {
    channels: Arc<Mutex<Channels>>,
}

impl EventBus {
    /// Empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `kind`.
    ///
    /// The returned [`Subscription`] must be kept and unsubscribed on
    /// teardown; dropping it leaves the handler registered.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        let mut channels = lock(&self.channels);
        channels.next_id += 1;
        let id = channels.next_id;
        channels
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            kind,
            id,
            channels: Arc::downgrade(&self.channels),
        }
    }

    /// Deliver `event` to its channel; returns how many handlers ran
    pub fn emit(&self, event: &StreamEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<(u64, Handler)> = lock(&self.channels)
            .handlers
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for (id, handler) in snapshot {
            // No lock is held while the handler runs, so it may (un)subscribe.
            if !lock(&self.channels).contains(kind, id) {
                continue;
            }
            handler(event);
            delivered += 1;
        }
        delivered
    }

    /// Number of handlers on `kind`
    pub fn handler_count(&self, kind: EventKind) -> usize {
        lock(&self.channels)
            .handlers
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

/// Handle returned by [`EventBus::on`]
#[must_use = "keep the subscription and call unsubscribe() on teardown"]
#[derive(Debug)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
    channels: Weak<Mutex<Channels>>,
}

impl Subscription {
    /// Channel this subscription listens on
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove the handler; returns whether it was still registered
    pub fn unsubscribe(self) -> bool {
        let Some(channels) = self.channels.upgrade() else {
            return false;
        };
        let mut channels = lock(&channels);
        let Some(list) = channels.handlers.get_mut(&self.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != self.id);
        before != list.len()
    }
}

fn lock(channels: &Mutex<Channels>) -> MutexGuard<'_, Channels> {
    channels
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

//! Live fleet view fed from the event bus.

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

use crate::bus::{EventBus, Subscription};
use crate::events::{EventKind, StreamEvent};
use crate::ingest::{PositionTracker, TrackedDriver};

/// Driver map kept current by stream events.
///
/// Attaching subscribes to the snapshot, status and position channels;
/// [`LiveFleet::detach`] removes exactly those handlers.
pub struct LiveFleet {
    tracker: Arc<Mutex<PositionTracker>>,
    subscriptions: Vec<Subscription>,
}

impl LiveFleet {
    /// Subscribe a new fleet view to `bus`
    pub fn attach(bus: &EventBus) -> Self {
        let tracker = Arc::new(Mutex::new(PositionTracker::new()));
        let kinds = [
            EventKind::InitialDrivers,
            EventKind::DriverOnline,
            EventKind::DriverOffline,
            EventKind::DriverPositionUpdate,
        ];

        let subscriptions = kinds
            .into_iter()
            .map(|kind| {
                let tracker = Arc::clone(&tracker);
                bus.on(kind, move |event| apply(&tracker, event))
            })
            .collect();

        Self {
            tracker,
            subscriptions,
        }
    }

    /// All known drivers, ordered by id
    pub fn snapshot(&self) -> Vec<TrackedDriver> {
        lock(&self.tracker).drivers()
    }

    /// Online drivers with a position, for map rendering
    pub fn visible(&self) -> Vec<TrackedDriver> {
        lock(&self.tracker).online_with_position()
    }

    /// One driver
    pub fn driver(&self, entity_id: &str) -> Option<TrackedDriver> {
        lock(&self.tracker).get(entity_id).cloned()
    }

    /// Unsubscribe from the bus; returns the final view
    pub fn detach(self) -> Vec<TrackedDriver> {
        for sub in self.subscriptions {
            sub.unsubscribe();
        }
        lock(&self.tracker).drivers()
    }
}

fn apply(tracker: &Mutex<PositionTracker>, event: &StreamEvent) {
    let now = Utc::now();
    let mut tracker = lock(tracker);
    match event {
        StreamEvent::InitialDrivers(drivers) => tracker.apply_snapshot(drivers, now),
        StreamEvent::DriverOnline(update) => tracker.apply_status(update, true, now),
        StreamEvent::DriverOffline(update) => tracker.apply_status(update, false, now),
        StreamEvent::DriverPositionUpdate(update) => {
            let outcome = tracker.apply_position(update, now);
            trace!(entity = %update.user_id, ?outcome, "position update applied");
        }
        _ => {}
    }
}

fn lock(tracker: &Mutex<PositionTracker>) -> MutexGuard<'_, PositionTracker> {
    tracker
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

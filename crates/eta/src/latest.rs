//! Last-request-wins bookkeeping for refreshed estimates.
//!
//! A consumer that refreshes its ETA while an older request is still in
//! flight takes a ticket per request and offers each result back with its
//! ticket. Only the newest ticket's result is kept; late arrivals from
//! superseded requests are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Identifies one refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

/// Holds the result of the most recent request
#[derive(Debug, Default)]
pub struct LatestEta<T> {
    issued: AtomicU64,
    current: Mutex<Option<(RequestTicket, Option<T>)>>,
}

impl<T: Clone> LatestEta<T> {
    /// Empty tracker
    pub fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    /// Start a request, superseding all earlier tickets
    pub fn begin(&self) -> RequestTicket {
        RequestTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `ticket` is still the newest issued
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }

    /// Offer the result of `ticket`'s request; returns whether it was kept
    pub fn complete(&self, ticket: RequestTicket, result: Option<T>) -> bool {
        if !self.is_current(ticket) {
            debug!(ticket = ticket.0, "discarding superseded ETA result");
            return false;
        }
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // A newer ticket may have been issued and completed while we waited.
        if matches!(&*current, Some((held, _)) if *held > ticket) {
            return false;
        }
        *current = Some((ticket, result));
        true
    }

    /// Latest kept result; `None` until one arrives or when it was an absence
    pub fn get(&self) -> Option<T> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .and_then(|(_, result)| result.clone())
    }
}

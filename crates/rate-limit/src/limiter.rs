//! Fixed-window counter

use fleetline_core::RateLimitRecord;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::store::{InMemoryStore, RateLimitStore};

/// Store size above which expired records are swept
pub const DEFAULT_EVICTION_THRESHOLD: usize = 1000;

/// Outcome of a single [`RateLimiter::check`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Request is allowed
    pub success: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// Window end, epoch milliseconds
    pub reset: u64,
}

impl RateLimitDecision {
    /// Seconds until the window resets, rounded up
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset.saturating_sub(now_ms).div_ceil(1000)
    }
}

/// Per-identifier fixed-window limiter.
///
/// `check` calls are serialized so a read-increment-write on the store is
/// never interleaved within one process.
pub struct RateLimiter<S = InMemoryStore> {
    store: S,
    eviction_threshold: usize,
    check_lock: Mutex<()>,
}

impl RateLimiter<InMemoryStore> {
    /// Limiter over a fresh process-local store
    pub fn in_memory() -> Self {
        Self::new(InMemoryStore::new())
    }
}

impl Default for RateLimiter<InMemoryStore> {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    /// Create a limiter over `store`
    pub fn new(store: S) -> Self {
        Self::with_eviction_threshold(store, DEFAULT_EVICTION_THRESHOLD)
    }

    /// Create a limiter with a custom sweep threshold
    pub fn with_eviction_threshold(store: S, eviction_threshold: usize) -> Self {
        Self {
            store,
            eviction_threshold,
            check_lock: Mutex::new(()),
        }
    }

    /// Backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Count a request for `identifier` against the wall clock
    pub fn check(&self, identifier: &str, limit: u32, window: Duration) -> RateLimitDecision {
        self.check_at(identifier, limit, window, now_ms())
    }

    /// Count a request for `identifier` at `now_ms`.
    ///
    /// A missing or expired record starts a new window with count 1. Within
    /// an active window the count is incremented while below `limit`;
    /// at or above `limit` the request is denied and the count is left as is.
    pub fn check_at(
        &self,
        identifier: &str,
        limit: u32,
        window: Duration,
        now_ms: u64,
    ) -> RateLimitDecision {
        let _guard = self
            .check_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        self.maybe_evict(now_ms);

        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);

        match self.store.get(identifier) {
            Some(record) if !record.is_expired(now_ms) => {
                if record.count >= limit {
                    debug!(identifier, count = record.count, limit, "rate limit exceeded");
                    return RateLimitDecision {
                        success: false,
                        remaining: 0,
                        reset: record.reset_time,
                    };
                }

                let count = record.count + 1;
                let reset = record.reset_time;
                self.store.put(RateLimitRecord {
                    count,
                    ..record
                });
                RateLimitDecision {
                    success: true,
                    remaining: limit.saturating_sub(count),
                    reset,
                }
            }
            _ => {
                if limit == 0 {
                    warn!(identifier, "rate limit configured with zero requests per window");
                    return RateLimitDecision {
                        success: false,
                        remaining: 0,
                        reset: now_ms.saturating_add(window_ms),
                    };
                }

                let reset = now_ms.saturating_add(window_ms);
                self.store.put(RateLimitRecord {
                    identifier: identifier.to_string(),
                    count: 1,
                    reset_time: reset,
                });
                RateLimitDecision {
                    success: true,
                    remaining: limit - 1,
                    reset,
                }
            }
        }
    }

    fn maybe_evict(&self, now_ms: u64) {
        if self.store.len() > self.eviction_threshold {
            let evicted = self.store.evict_expired(now_ms);
            debug!(evicted, remaining = self.store.len(), "swept expired rate-limit records");
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

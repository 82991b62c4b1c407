//! Fixed-window rate limiting for outbound routing/geocoding calls.
//!
//! The limiter counts requests per caller identity inside a window that
//! resets entirely once it elapses. State lives in a [`RateLimitStore`]
//! injected at construction; [`InMemoryStore`] keeps it process-local, so
//! limits are not shared across server instances unless a shared store is
//! plugged in.
//!
//! The limiter never fails: exceeding the limit is reported through
//! [`RateLimitDecision::success`].

#![warn(missing_docs)]

pub mod identity;
pub mod limiter;
pub mod store;

pub use identity::{client_identifier, UNKNOWN_CLIENT};
pub use limiter::{RateLimitDecision, RateLimiter, DEFAULT_EVICTION_THRESHOLD};
pub use store::{InMemoryStore, RateLimitStore};

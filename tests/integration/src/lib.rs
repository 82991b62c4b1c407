//! Cross-crate integration tests for Fleetline
//!
//! This test suite validates:
//! - the directions client against a local HTTP server
//! - the supervised WebSocket session feeding the live fleet view
//! - rate-gated ETA estimation with vehicle scaling and legacy fallback
//! - delivery identifiers for order records

pub mod test_utils;

#[cfg(test)]
mod directions_tests;

#[cfg(test)]
mod fleet_stream_tests;

#[cfg(test)]
mod dispatch_flow_tests;

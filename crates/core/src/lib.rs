//! Core functionality for the Fleetline real-time fleet subsystem.
//!
//! This crate provides the shared data model, configuration, error and
//! logging plumbing used by the position, ETA and rate-limiting crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{Config, ConfigError, RateLimitConfig, RoutingConfig, StreamConfig};
pub use error::{CoreError, Result};
pub use types::{
    ConnectionState, Coordinate, PositionSample, RateLimitRecord, RouteResult, TrafficEstimate,
};

//! Shared data model for fleet positions, routes and rate limiting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Geographic coordinate in decimal degrees.
///
/// This is the single internal ordering (latitude first). Provider-specific
/// orderings are converted at the provider boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lng: f64,
}

impl Coordinate {
    /// Create a coordinate without range validation
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Create a coordinate, rejecting out-of-range or non-finite values
    pub fn try_new(lat: f64, lng: f64) -> Result<Self, CoreError> {
        let coord = Self { lat, lng };
        if coord.is_valid() {
            Ok(coord)
        } else {
            Err(CoreError::InvalidCoordinate { lat, lng })
        }
    }

    /// Build from a `[lng, lat]` pair as emitted by GeoJSON providers
    pub fn from_lng_lat(pair: [f64; 2]) -> Self {
        Self {
            lat: pair[1],
            lng: pair[0],
        }
    }

    /// Latitude within [-90, 90], longitude within [-180, 180], both finite
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Lifecycle of the event-stream session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session and no attempt in flight
    #[default]
    Disconnected,
    /// An attempt is in flight
    Connecting,
    /// Session established
    Connected,
    /// Last attempt failed; a new `connect()` is accepted
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// One observed driver position.
///
/// Samples are never mutated; a newer sample for the same entity replaces
/// the held one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionSample {
    /// Driver (user) identifier
    pub entity_id: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// When the position was recorded
    pub timestamp: DateTime<Utc>,
    /// Driver reported online
    pub is_online: bool,
    /// Driver accepting new orders
    pub is_available: bool,
}

impl PositionSample {
    /// Position as a [`Coordinate`]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Strictly newer than `other`
    pub fn is_newer_than(&self, other: &PositionSample) -> bool {
        self.timestamp > other.timestamp
    }
}

/// A driving route returned by a routing provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteResult {
    /// Route geometry, latitude first
    pub coordinates: Vec<Coordinate>,
    /// Live (traffic-weighted) duration in seconds
    pub duration_seconds: f64,
    /// Traffic-free baseline duration in seconds, when the provider has one
    pub duration_typical_seconds: Option<f64>,
    /// Route length in meters
    pub distance_meters: f64,
}

/// Traffic view of a route, independent of the provider that produced it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct TrafficEstimate {
    /// Live duration in seconds
    pub duration_in_traffic: Option<f64>,
    /// Baseline duration in seconds
    pub duration_base: Option<f64>,
    /// A distinct baseline exists and differs from the live duration
    pub has_traffic_data: bool,
}

impl TrafficEstimate {
    /// Preferred duration: live if present, else baseline
    pub fn best_duration(&self) -> Option<f64> {
        self.duration_in_traffic.or(self.duration_base)
    }

    /// Extra seconds caused by traffic, when known
    pub fn traffic_delay(&self) -> Option<f64> {
        if !self.has_traffic_data {
            return None;
        }
        match (self.duration_in_traffic, self.duration_base) {
            (Some(live), Some(base)) => Some(live - base),
            _ => None,
        }
    }
}

/// Fixed-window counter for one caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitRecord {
    /// Caller identity (IP or user id)
    pub identifier: String,
    /// Requests counted in the current window
    pub count: u32,
    /// End of the window, epoch milliseconds
    pub reset_time: u64,
}

impl RateLimitRecord {
    /// Window has elapsed at `now_ms`
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.reset_time
    }
}

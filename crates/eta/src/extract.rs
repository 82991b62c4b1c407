//! Provider-neutral traffic extraction.
//!
//! Two response shapes reduce to the same [`TrafficEstimate`]:
//! - a traffic-aware route ([`RouteResult`]), whose typical duration is the
//!   traffic-free baseline
//! - a legacy leg carrying `duration` and `duration_in_traffic` values
//!
//! When both are available the traffic-aware route wins.

use fleetline_core::{RouteResult, TrafficEstimate};
use serde::{Deserialize, Serialize};

use crate::vehicle::VehicleType;

/// `{ "value": seconds }` wrapper used by the legacy leg shape
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LegacyValue {
    /// Seconds
    pub value: f64,
}

/// Leg of a legacy directions response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LegacyLeg {
    /// Typical duration
    #[serde(default)]
    pub duration: Option<LegacyValue>,
    /// Duration under current traffic
    #[serde(default)]
    pub duration_in_traffic: Option<LegacyValue>,
}

/// Estimate from a traffic-aware route.
///
/// The baseline is the route's typical duration when present, otherwise the
/// live duration itself, in which case the estimate claims no traffic data.
pub fn from_route(route: &RouteResult) -> TrafficEstimate {
    let live = usable(route.duration_seconds);
    let typical = route.duration_typical_seconds.and_then(usable);

    TrafficEstimate {
        duration_in_traffic: live,
        duration_base: typical.or(live),
        has_traffic_data: distinct(live, typical),
    }
}

/// Estimate from a legacy leg
pub fn from_legacy_leg(leg: &LegacyLeg) -> TrafficEstimate {
    let live = leg.duration_in_traffic.map(|v| v.value).and_then(usable);
    let base = leg.duration.map(|v| v.value).and_then(usable);

    TrafficEstimate {
        duration_in_traffic: live,
        duration_base: base,
        has_traffic_data: distinct(live, base),
    }
}

/// Choose between the two sources; a traffic-aware route takes precedence.
pub fn select(route: Option<&RouteResult>, legacy: Option<&LegacyLeg>) -> Option<TrafficEstimate> {
    route
        .map(from_route)
        .filter(|estimate| estimate.best_duration().is_some())
        .or_else(|| legacy.map(from_legacy_leg))
        .filter(|estimate| estimate.best_duration().is_some())
}

/// Vehicle-adjusted arrival time in whole seconds.
///
/// `None` when the estimate carries no duration at all.
pub fn eta_seconds(estimate: &TrafficEstimate, vehicle: VehicleType) -> Option<u64> {
    estimate
        .best_duration()
        .map(|seconds| (seconds * vehicle.multiplier()).round() as u64)
}

fn usable(seconds: f64) -> Option<f64> {
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

fn distinct(live: Option<f64>, base: Option<f64>) -> bool {
    match (live, base) {
        (Some(live), Some(base)) => (live - base).abs() > f64::EPSILON,
        _ => false,
    }
}

//! Geospatial helpers for marker orientation.
//!
//! - [`bearing`]: great-circle initial bearing between two positions
//! - [`haversine_distance`]: great-circle distance in meters
//!
//! All inputs use the internal latitude-first [`Coordinate`].

#![warn(missing_docs)]

use fleetline_core::Coordinate;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Separation below which two positions are treated as coincident (meters).
pub const COINCIDENT_THRESHOLD_M: f64 = 1e-3;

/// Initial bearing from `from` to `to`, in degrees within `[0, 360)`.
///
/// 0 is north, 90 east. Returns `None` when the positions are coincident
/// or not finite; callers keep their previous heading in that case.
///
/// ```
/// use fleetline_core::Coordinate;
/// use fleetline_geo::bearing;
///
/// let east = bearing(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)).unwrap();
/// assert!((east - 90.0).abs() < 1e-9);
/// ```
pub fn bearing(from: Coordinate, to: Coordinate) -> Option<f64> {
    if !is_finite(&from) || !is_finite(&to) {
        return None;
    }
    if haversine_distance(from, to) < COINCIDENT_THRESHOLD_M {
        return None;
    }

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let y = delta_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lng.cos();

    Some(normalize_degrees(y.atan2(x).to_degrees()))
}

/// Great-circle distance between two positions in meters (haversine).
pub fn haversine_distance(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Wrap an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Smallest absolute difference between two headings, in `[0, 180]`.
pub fn heading_difference(a: f64, b: f64) -> f64 {
    let diff = normalize_degrees(a - b);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

fn is_finite(coord: &Coordinate) -> bool {
    coord.lat.is_finite() && coord.lng.is_finite()
}

//! Live position ingestion.
//!
//! Keeps the latest accepted [`PositionSample`] per driver and the heading
//! derived from consecutive accepted samples. A sample whose timestamp is
//! not strictly newer than the held one is dropped, so late network
//! delivery never moves a marker backward.
//!
//! Online status changes only on explicit `driver:online` /
//! `driver:offline` events; a silent driver stays online.

use chrono::{DateTime, Utc};
use fleetline_core::{Coordinate, PositionSample};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::events::{parse_timestamp, DriverSnapshot, DriverUpdate};

/// Result of offering a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IngestOutcome {
    /// Sample became the driver's current position
    Accepted {
        /// Heading after this sample; unchanged when the driver did not move
        heading: Option<f64>,
    },
    /// Timestamp not newer than the held sample
    Stale,
    /// Coordinates out of range
    Invalid,
}

impl IngestOutcome {
    /// Sample was applied
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Render state for one driver
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackedDriver {
    /// Driver user id
    pub entity_id: String,
    /// Latest accepted sample
    pub sample: Option<PositionSample>,
    /// Marker heading in degrees, `[0, 360)`
    pub heading: Option<f64>,
    /// Online per the last status event
    pub is_online: bool,
    /// Accepting orders per the last status event
    pub is_available: bool,
}

impl TrackedDriver {
    fn new(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            sample: None,
            heading: None,
            is_online: false,
            is_available: false,
        }
    }

    /// Current position, if one has been accepted
    pub fn position(&self) -> Option<Coordinate> {
        self.sample.as_ref().map(PositionSample::coordinate)
    }
}

/// Per-driver position state
#[derive(Debug, Default)]
pub struct PositionTracker {
    drivers: HashMap<String, TrackedDriver>,
}

impl PositionTracker {
    /// Empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a sample for its entity
    pub fn ingest(&mut self, sample: PositionSample) -> IngestOutcome {
        if !sample.coordinate().is_valid() {
            debug!(entity = %sample.entity_id, "rejecting out-of-range position");
            return IngestOutcome::Invalid;
        }

        let driver = self
            .drivers
            .entry(sample.entity_id.clone())
            .or_insert_with(|| TrackedDriver::new(&sample.entity_id));

        if let Some(held) = &driver.sample {
            if !sample.is_newer_than(held) {
                debug!(
                    entity = %sample.entity_id,
                    held = %held.timestamp,
                    offered = %sample.timestamp,
                    "dropping stale position"
                );
                return IngestOutcome::Stale;
            }
            if let Some(heading) = fleetline_geo::bearing(held.coordinate(), sample.coordinate()) {
                driver.heading = Some(heading);
            }
        }

        driver.sample = Some(sample);
        IngestOutcome::Accepted {
            heading: driver.heading,
        }
    }

    /// Apply a `driver:position:update`; `None` when it carries no position
    pub fn apply_position(
        &mut self,
        update: &DriverUpdate,
        received_at: DateTime<Utc>,
    ) -> Option<IngestOutcome> {
        let (is_online, is_available) = self
            .drivers
            .get(&update.user_id)
            .map(|d| (d.is_online, d.is_available))
            .unwrap_or((false, false));

        let sample = PositionSample {
            entity_id: update.user_id.clone(),
            latitude: update.current_latitude?,
            longitude: update.current_longitude?,
            timestamp: stamp(update.updated_at.as_deref(), received_at),
            is_online,
            is_available: update.is_available.unwrap_or(is_available),
        };
        Some(self.ingest(sample))
    }

    /// Apply `driver:online` (`online = true`) or `driver:offline`.
    ///
    /// Going offline also clears availability. A position carried by the
    /// event is ingested like any other sample.
    pub fn apply_status(&mut self, update: &DriverUpdate, online: bool, received_at: DateTime<Utc>) {
        let driver = self
            .drivers
            .entry(update.user_id.clone())
            .or_insert_with(|| TrackedDriver::new(&update.user_id));
        driver.is_online = online;
        driver.is_available = if online {
            update.is_available.unwrap_or(driver.is_available)
        } else {
            false
        };
        debug!(entity = %update.user_id, online, "driver status changed");

        self.apply_position(update, received_at);
    }

    /// Seed from the `initial-drivers` snapshot.
    ///
    /// Snapshot positions go through the same staleness check, so a
    /// reconnect snapshot older than live samples does not rewind markers.
    pub fn apply_snapshot(&mut self, drivers: &[DriverSnapshot], received_at: DateTime<Utc>) {
        for snapshot in drivers {
            let driver = self
                .drivers
                .entry(snapshot.user_id.clone())
                .or_insert_with(|| TrackedDriver::new(&snapshot.user_id));
            driver.is_online = snapshot.is_online;
            driver.is_available = snapshot.is_available;

            if let (Some(latitude), Some(longitude)) =
                (snapshot.current_latitude, snapshot.current_longitude)
            {
                self.ingest(PositionSample {
                    entity_id: snapshot.user_id.clone(),
                    latitude,
                    longitude,
                    timestamp: stamp(snapshot.updated_at.as_deref(), received_at),
                    is_online: snapshot.is_online,
                    is_available: snapshot.is_available,
                });
            }
        }
    }

    /// State for one driver
    pub fn get(&self, entity_id: &str) -> Option<&TrackedDriver> {
        self.drivers.get(entity_id)
    }

    /// All drivers, ordered by id
    pub fn drivers(&self) -> Vec<TrackedDriver> {
        let mut drivers: Vec<_> = self.drivers.values().cloned().collect();
        drivers.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        drivers
    }

    /// Online drivers with a known position
    pub fn online_with_position(&self) -> Vec<TrackedDriver> {
        self.drivers()
            .into_iter()
            .filter(|d| d.is_online && d.sample.is_some())
            .collect()
    }

    /// Number of tracked drivers
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// No drivers tracked
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

fn stamp(updated_at: Option<&str>, received_at: DateTime<Utc>) -> DateTime<Utc> {
    updated_at.and_then(parse_timestamp).unwrap_or(received_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 11, 10, 0, 0).unwrap()
    }

    fn sample(id: &str, lat: f64, lng: f64, at: DateTime<Utc>) -> PositionSample {
        PositionSample {
            entity_id: id.to_string(),
            latitude: lat,
            longitude: lng,
            timestamp: at,
            is_online: true,
            is_available: true,
        }
    }

    #[test]
    fn test_out_of_order_sample_is_dropped() {
        let mut tracker = PositionTracker::new();
        let accepted: Vec<bool> = [t0(), t0() - Duration::seconds(1), t0() + Duration::seconds(2)]
            .into_iter()
            .enumerate()
            .map(|(i, at)| {
                tracker
                    .ingest(sample("d-1", -1.29 + i as f64 * 0.001, 36.82, at))
                    .is_accepted()
            })
            .collect();

        assert_eq!(accepted, vec![true, false, true]);
        let held = tracker.get("d-1").unwrap().sample.as_ref().unwrap();
        assert_eq!(held.timestamp, t0() + Duration::seconds(2));
    }

    #[test]
    fn test_equal_timestamp_is_stale() {
        let mut tracker = PositionTracker::new();
        tracker.ingest(sample("d-1", 0.0, 0.0, t0()));
        assert_eq!(tracker.ingest(sample("d-1", 0.1, 0.0, t0())), IngestOutcome::Stale);
    }

    #[test]
    fn test_entities_are_independent() {
        let mut tracker = PositionTracker::new();
        tracker.ingest(sample("d-1", 0.0, 0.0, t0()));
        let outcome = tracker.ingest(sample("d-2", 0.0, 0.0, t0() - Duration::hours(1)));
        assert!(outcome.is_accepted());
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_heading_follows_movement() {
        let mut tracker = PositionTracker::new();
        assert_eq!(
            tracker.ingest(sample("d-1", 0.0, 0.0, t0())),
            IngestOutcome::Accepted { heading: None }
        );

        let IngestOutcome::Accepted { heading: Some(east) } =
            tracker.ingest(sample("d-1", 0.0, 0.01, t0() + Duration::seconds(5)))
        else {
            panic!("expected heading");
        };
        assert!((east - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_stationary_sample_keeps_heading() {
        let mut tracker = PositionTracker::new();
        tracker.ingest(sample("d-1", 0.0, 0.0, t0()));
        tracker.ingest(sample("d-1", 0.01, 0.0, t0() + Duration::seconds(5)));
        let outcome = tracker.ingest(sample("d-1", 0.01, 0.0, t0() + Duration::seconds(10)));

        let IngestOutcome::Accepted { heading: Some(heading) } = outcome else {
            panic!("expected retained heading");
        };
        assert!(heading.abs() < 1e-6 && !heading.is_nan());
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        let mut tracker = PositionTracker::new();
        assert_eq!(
            tracker.ingest(sample("d-1", 95.0, 0.0, t0())),
            IngestOutcome::Invalid
        );
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_status_events_are_discrete() {
        let mut tracker = PositionTracker::new();
        let mut online = DriverUpdate::new("d-1");
        online.is_available = Some(true);
        tracker.apply_status(&online, true, t0());

        let driver = tracker.get("d-1").unwrap();
        assert!(driver.is_online && driver.is_available);
        assert!(driver.sample.is_none());

        // Position updates never flip online status
        let update = DriverUpdate::new("d-1").with_position(-1.29, 36.82, t0());
        tracker.apply_position(&update, t0());
        assert!(tracker.get("d-1").unwrap().is_online);

        tracker.apply_status(&DriverUpdate::new("d-1"), false, t0());
        let driver = tracker.get("d-1").unwrap();
        assert!(!driver.is_online && !driver.is_available);
        assert!(driver.sample.is_some());
    }

    #[test]
    fn test_update_without_position_is_ignored() {
        let mut tracker = PositionTracker::new();
        assert_eq!(tracker.apply_position(&DriverUpdate::new("d-1"), t0()), None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_missing_timestamp_uses_receive_time() {
        let mut tracker = PositionTracker::new();
        let mut update = DriverUpdate::new("d-1");
        update.current_latitude = Some(-1.29);
        update.current_longitude = Some(36.82);
        tracker.apply_position(&update, t0());

        let held = tracker.get("d-1").unwrap().sample.clone().unwrap();
        assert_eq!(held.timestamp, t0());
    }

    #[test]
    fn test_snapshot_does_not_rewind_live_position() {
        let mut tracker = PositionTracker::new();
        tracker.ingest(sample("d-1", -1.28, 36.83, t0()));

        let snapshot = DriverSnapshot {
            user_id: "d-1".to_string(),
            is_online: true,
            is_available: false,
            current_latitude: Some(-1.30),
            current_longitude: Some(36.80),
            updated_at: Some("2024-12-11T09:59:00Z".to_string()),
        };
        let fresh = DriverSnapshot {
            user_id: "d-2".to_string(),
            is_online: false,
            is_available: false,
            current_latitude: None,
            current_longitude: None,
            updated_at: None,
        };
        tracker.apply_snapshot(&[snapshot, fresh], t0());

        let d1 = tracker.get("d-1").unwrap();
        assert_eq!(d1.position(), Some(Coordinate::new(-1.28, 36.83)));
        assert!(!d1.is_available);
        assert!(tracker.get("d-2").unwrap().sample.is_none());
        assert_eq!(tracker.online_with_position().len(), 1);
    }
}

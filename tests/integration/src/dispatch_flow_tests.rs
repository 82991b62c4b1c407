//! Rate-gated ETA estimation and order presentation across crates

use async_trait::async_trait;
use chrono::NaiveDate;
use fleetline_core::{Coordinate, RouteResult};
use fleetline_delivery_id::{format_delivery_id_on, CreatedAt};
use fleetline_eta::{
    format_eta, EtaEngine, EtaError, EtaRequest, LatestEta, LegacyLeg, LegacyValue, RateGate,
    RouteProvider, VehicleType,
};
use fleetline_rate_limit::{client_identifier, InMemoryStore, RateLimitStore, RateLimiter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::test_utils::current_timestamp_ms;

struct CountingProvider {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingProvider {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }
}

#[async_trait]
impl RouteProvider for CountingProvider {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        _access_token: &str,
    ) -> Result<RouteResult, EtaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EtaError::Status(502));
        }
        Ok(RouteResult {
            coordinates: vec![origin, destination],
            duration_seconds: 4_000.0,
            duration_typical_seconds: None,
            distance_meters: 30_000.0,
        })
    }
}

fn request(vehicle: &str) -> EtaRequest {
    EtaRequest {
        origin: Coordinate::new(-1.2921, 36.8219),
        destination: Coordinate::new(-1.0400, 37.0800),
        vehicle: VehicleType::from_label(vehicle),
    }
}

#[tokio::test]
async fn test_gate_protects_provider_per_caller() {
    let provider = CountingProvider::new(false);
    let limiter = Arc::new(RateLimiter::new(InMemoryStore::new()));
    let engine = EtaEngine::new(Arc::clone(&provider), Some("pk.test".to_string()))
        .with_rate_gate(RateGate::new(Arc::clone(&limiter), 3, Duration::from_secs(60)));

    let caller = client_identifier(Some("198.51.100.4, 10.0.0.1"), None);
    for _ in 0..3 {
        let admitted = engine.estimate_for(&caller, &request("van")).await.unwrap();
        assert!(admitted.decision.is_some_and(|d| d.success));
        let estimate = admitted.estimate.unwrap();
        assert_eq!(estimate.display, "1h 6 min");
        assert!(!estimate.traffic.has_traffic_data);
    }

    let denied = engine.estimate_for(&caller, &request("van")).await.unwrap_err();
    assert!(!denied.success);
    assert!(denied.reset >= current_timestamp_ms());
    assert!(denied.retry_after_secs(current_timestamp_ms()) <= 60);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);

    // Unidentified callers share one bucket, separate from the caller above
    let anonymous = client_identifier(None, None);
    assert!(engine.estimate_for(&anonymous, &request("van")).await.is_ok());
    assert_eq!(limiter.store().len(), 2);
}

#[test]
fn test_window_reset_and_sweep() {
    let limiter = RateLimiter::with_eviction_threshold(InMemoryStore::new(), 2);
    let window = Duration::from_secs(60);
    let t0 = 1_700_000_000_000;

    let decisions: Vec<(bool, u32)> = (0..4)
        .map(|_| {
            let d = limiter.check_at("203.0.113.9", 3, window, t0);
            (d.success, d.remaining)
        })
        .collect();
    assert_eq!(decisions, vec![(true, 2), (true, 1), (true, 0), (false, 0)]);

    limiter.check_at("203.0.113.10", 3, window, t0);
    limiter.check_at("203.0.113.11", 3, window, t0);
    assert_eq!(limiter.store().len(), 3);

    // Past every window: the next check sweeps before counting
    let later = t0 + 60_001;
    let fresh = limiter.check_at("203.0.113.9", 3, window, later);
    assert!(fresh.success);
    assert_eq!(fresh.remaining, 2);
    assert_eq!(fresh.reset, later + 60_000);
    assert_eq!(limiter.store().len(), 1);
}

#[tokio::test]
async fn test_outage_falls_back_to_legacy_leg() {
    let provider = CountingProvider::new(true);
    let engine = EtaEngine::new(Arc::clone(&provider), Some("pk.test".to_string()));
    let leg = LegacyLeg {
        duration: Some(LegacyValue { value: 1_800.0 }),
        duration_in_traffic: Some(LegacyValue { value: 2_400.0 }),
    };

    let estimate = engine
        .estimate_with_fallback(&request("motorcycle"), Some(&leg))
        .await
        .unwrap();
    assert_eq!(estimate.eta_seconds, 1_920);
    assert_eq!(estimate.display, "32 min");
    assert!(estimate.traffic.has_traffic_data);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    assert!(engine.estimate(&request("motorcycle")).await.is_none());
    assert_eq!(format_eta(None), "Calculating...");
}

#[tokio::test]
async fn test_latest_refresh_wins() {
    let provider = CountingProvider::new(false);
    let engine = EtaEngine::new(provider, Some("pk.test".to_string()));
    let latest = LatestEta::new();

    let stale = latest.begin();
    let fresh = latest.begin();
    let truck = engine.estimate(&request("truck")).await;
    let bike = engine.estimate(&request("bike")).await;

    assert!(latest.complete(fresh, bike));
    assert!(!latest.complete(stale, truck));
    assert_eq!(latest.get().unwrap().eta_seconds, 3_200);
}

#[test]
fn test_delivery_ids_for_order_records() {
    let today = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
    let cases = [
        (Some("abc123"), Some(CreatedAt::Text("2024-12-11".into())), "CHLV\u{2013}241211-C123"),
        (Some("ord_9f8e7d"), Some(CreatedAt::Text("11/12/2024".into())), "CHLV\u{2013}241211-8E7D"),
        (Some("x9"), Some(CreatedAt::Text("garbage".into())), "CHLV\u{2013}250102-X900"),
        (None, None, "CHLV\u{2013}250102-0000"),
    ];

    for (raw_id, created_at, expected) in cases {
        assert_eq!(format_delivery_id_on(raw_id, created_at.as_ref(), today), expected);
    }
}

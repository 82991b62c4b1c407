//! Supervised WebSocket session feeding the live fleet view

use chrono::{Duration, TimeZone, Utc};
use fleetline_core::ConnectionState;
use fleetline_fleet_stream::{
    decode_frame, encode_frame, ConnectionSupervisor, DriverSnapshot, DriverUpdate, EventKind,
    LiveFleet, StreamEvent, Subscription, WsTransport,
};
use std::sync::{Arc, Mutex};

use crate::test_utils::{eventually, init_logging, spawn_stream_server};

fn frames() -> Vec<String> {
    let t0 = Utc.with_ymd_and_hms(2024, 12, 11, 10, 0, 0).unwrap();
    let events = [
        StreamEvent::InitialDrivers(vec![DriverSnapshot {
            user_id: "d-1".to_string(),
            is_online: true,
            is_available: true,
            current_latitude: Some(-1.2921),
            current_longitude: Some(36.8219),
            updated_at: Some(t0.to_rfc3339()),
        }]),
        StreamEvent::DriverOnline(DriverUpdate::new("d-2")),
        StreamEvent::DriverPositionUpdate(
            DriverUpdate::new("d-1").with_position(-1.2921, 36.8300, t0 + Duration::seconds(30)),
        ),
        // Arrives late: older than the sample above
        StreamEvent::DriverPositionUpdate(
            DriverUpdate::new("d-1").with_position(-1.3000, 36.8000, t0 + Duration::seconds(10)),
        ),
    ];
    let mut frames: Vec<String> = events.iter().map(|e| encode_frame(e).unwrap()).collect();
    // A server-side "connected" frame must not drive connection state
    frames.insert(0, r#"{"event":"connected","data":null}"#.to_string());
    frames.push(r#"{"event":"driver:teleport","data":{}}"#.to_string());
    frames
}

fn record(
    sup: &ConnectionSupervisor,
    kind: EventKind,
) -> (Arc<Mutex<Vec<StreamEvent>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = sup.on(kind, move |e| sink.lock().unwrap().push(e.clone()));
    (seen, sub)
}

#[tokio::test]
async fn test_live_fleet_over_websocket() {
    init_logging();
    let server = spawn_stream_server(frames(), false).await;
    let sup = ConnectionSupervisor::new(WsTransport::new(&server.url).unwrap());
    let fleet = LiveFleet::attach(sup.bus());
    let (connected, _sub) = record(&sup, EventKind::Connected);

    sup.connect();
    sup.connect();

    eventually("driver d-1 to move east", || {
        fleet
            .driver("d-1")
            .and_then(|d| d.sample)
            .is_some_and(|s| s.longitude == 36.8300)
    })
    .await;
    // Give the late sample time to arrive and be dropped
    eventually("driver d-2 online", || fleet.driver("d-2").is_some()).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert!(sup.is_connected());
    assert_eq!(connected.lock().unwrap().len(), 1);

    let d1 = fleet.driver("d-1").unwrap();
    assert_eq!(d1.sample.as_ref().unwrap().longitude, 36.8300);
    let heading = d1.heading.unwrap();
    assert!((heading - 90.0).abs() < 0.01, "heading {heading}");
    assert!(fleet.driver("d-2").unwrap().is_online);

    sup.disconnect();
    assert_eq!(sup.state(), ConnectionState::Disconnected);
    assert_eq!(fleet.detach().len(), 2);
}

#[tokio::test]
async fn test_outbound_emit_reaches_server() {
    let server = spawn_stream_server(Vec::new(), false).await;
    let sup = ConnectionSupervisor::new(WsTransport::new(&server.url).unwrap());

    sup.connect();
    eventually("connection", || sup.is_connected()).await;

    let update = StreamEvent::DriverPositionUpdate(
        DriverUpdate::new("d-9").with_position(-1.28, 36.82, Utc::now()),
    );
    assert!(sup.emit(&update));

    let received = Arc::clone(&server.received);
    eventually("server to receive the update", || !received.lock().unwrap().is_empty()).await;
    let frame = received.lock().unwrap()[0].clone();
    assert_eq!(decode_frame(&frame).unwrap(), update);
}

#[tokio::test]
async fn test_server_hang_up_reports_disconnect() {
    let server = spawn_stream_server(Vec::new(), true).await;
    let sup = ConnectionSupervisor::new(WsTransport::new(&server.url).unwrap());
    let (disconnected, _sub) = record(&sup, EventKind::Disconnected);

    sup.connect();
    eventually("disconnect", || !disconnected.lock().unwrap().is_empty()).await;

    assert_eq!(sup.state(), ConnectionState::Disconnected);
    assert!(!sup.emit(&StreamEvent::DriverOffline(DriverUpdate::new("d-1"))));
}

#[tokio::test]
async fn test_unreachable_server_reports_failure_and_allows_retry() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/stream", listener.local_addr().unwrap());
    drop(listener);

    let sup = ConnectionSupervisor::new(WsTransport::new(&url).unwrap());
    let (failures, _sub) = record(&sup, EventKind::ConnectionFailed);

    sup.connect();
    eventually("first failure", || failures.lock().unwrap().len() == 1).await;
    assert_eq!(sup.state(), ConnectionState::Failed);

    sup.connect();
    eventually("second failure", || failures.lock().unwrap().len() == 2).await;

    let StreamEvent::ConnectionFailed(failure) = failures.lock().unwrap()[0].clone() else {
        panic!("unexpected event");
    };
    assert_eq!(failure.url, url);
}

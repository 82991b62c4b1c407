//! Directions client over real HTTP

use axum::http::StatusCode;
use fleetline_core::{Config, Coordinate};
use fleetline_eta::{DirectionsProvider, EtaEngine, EtaError, EtaRequest, RouteProvider, VehicleType};

use crate::test_utils::{init_logging, spawn_directions_server};

const NAIROBI_ROUTE: &str = r#"{
    "code": "Ok",
    "routes": [{
        "geometry": {"type": "LineString", "coordinates": [[36.8219, -1.2921], [36.8250, -1.2890], [36.8300, -1.2850]]},
        "legs": [{"duration": 1500.0, "duration_typical": 1200.0, "distance": 6500.0}],
        "duration": 1500.0,
        "distance": 6500.0
    }]
}"#;

fn origin() -> Coordinate {
    Coordinate::new(-1.2921, 36.8219)
}

fn destination() -> Coordinate {
    Coordinate::new(-1.2850, 36.8300)
}

#[tokio::test]
async fn test_request_is_longitude_first_with_token() {
    init_logging();
    let server = spawn_directions_server(StatusCode::OK, NAIROBI_ROUTE).await;
    let provider =
        DirectionsProvider::new(server.base_url.clone(), std::time::Duration::from_secs(5)).unwrap();

    let route = provider.route(origin(), destination(), "pk.secret").await.unwrap();
    assert_eq!(route.coordinates.len(), 3);
    assert_eq!(route.coordinates[0], origin());
    assert_eq!(route.duration_typical_seconds, Some(1200.0));

    let requests = server.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].coordinates, "36.8219,-1.2921;36.83,-1.285");
    assert_eq!(requests[0].query.get("access_token").map(String::as_str), Some("pk.secret"));
    assert_eq!(requests[0].query.get("geometries").map(String::as_str), Some("geojson"));
}

#[tokio::test]
async fn test_http_error_status() {
    let server = spawn_directions_server(StatusCode::UNAUTHORIZED, r#"{"message":"Not Authorized"}"#).await;
    let provider =
        DirectionsProvider::new(server.base_url.clone(), std::time::Duration::from_secs(5)).unwrap();

    let result = provider.route(origin(), destination(), "pk.bad").await;
    assert!(matches!(result, Err(EtaError::Status(401))));
}

#[tokio::test]
async fn test_engine_from_config_end_to_end() {
    let server = spawn_directions_server(StatusCode::OK, NAIROBI_ROUTE).await;
    let mut config = Config::default_config();
    config.routing.base_url = server.base_url.clone();
    config.routing.access_token = Some("pk.secret".to_string());

    let engine = EtaEngine::from_config(&config.routing).unwrap();
    let estimate = engine
        .estimate(&EtaRequest {
            origin: origin(),
            destination: destination(),
            vehicle: VehicleType::Truck,
        })
        .await
        .unwrap();

    assert_eq!(estimate.eta_seconds, 1950);
    assert_eq!(estimate.display, "33 min");
    assert!(estimate.traffic.has_traffic_data);
    assert_eq!(estimate.traffic.traffic_delay(), Some(300.0));
    let heading = estimate.initial_heading.unwrap();
    assert!(heading > 0.0 && heading < 90.0, "heading {heading}");
}

#[tokio::test]
async fn test_unconfigured_engine_never_calls_provider() {
    let server = spawn_directions_server(StatusCode::OK, NAIROBI_ROUTE).await;
    let mut config = Config::default_config();
    config.routing.base_url = server.base_url.clone();
    config.routing.access_token = Some(String::new());

    let engine = EtaEngine::from_config(&config.routing).unwrap();
    let estimate = engine
        .estimate(&EtaRequest {
            origin: origin(),
            destination: destination(),
            vehicle: VehicleType::Car,
        })
        .await;

    assert!(estimate.is_none());
    assert!(server.requests.lock().unwrap().is_empty());
}

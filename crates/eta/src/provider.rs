//! Routing provider seam and the traffic-aware directions client.
//!
//! Providers speak longitude-first GeoJSON. Everything returned from this
//! module is already converted to latitude-first [`Coordinate`]s.

use async_trait::async_trait;
use fleetline_core::{Coordinate, RouteResult, RoutingConfig};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::EtaError;

/// Source of driving routes
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Fetch a live-traffic driving route from `origin` to `destination`
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        access_token: &str,
    ) -> Result<RouteResult, EtaError>;
}

#[async_trait]
impl<T: RouteProvider + ?Sized> RouteProvider for std::sync::Arc<T> {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        access_token: &str,
    ) -> Result<RouteResult, EtaError> {
        (**self).route(origin, destination, access_token).await
    }
}

/// Traffic-aware directions API client.
///
/// Issues `GET {base}/driving-traffic/{lng1},{lat1};{lng2},{lat2}?geometries=geojson&access_token=..`.
#[derive(Debug, Clone)]
pub struct DirectionsProvider {
    client: reqwest::Client,
    base_url: String,
}

impl DirectionsProvider {
    /// Create a client against `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EtaError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from routing configuration
    pub fn from_config(config: &RoutingConfig) -> Result<Self, EtaError> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Request URL without credentials
    pub fn route_url(&self, origin: Coordinate, destination: Coordinate) -> String {
        format!(
            "{}/driving-traffic/{},{};{},{}",
            self.base_url, origin.lng, origin.lat, destination.lng, destination.lat
        )
    }
}

#[async_trait]
impl RouteProvider for DirectionsProvider {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        access_token: &str,
    ) -> Result<RouteResult, EtaError> {
        let url = self.route_url(origin, destination);
        debug!(%url, "requesting traffic-aware route");

        let response = self
            .client
            .get(&url)
            .query(&[("geometries", "geojson"), ("access_token", access_token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EtaError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_directions(&body)
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<WireRoute>,
}

#[derive(Debug, Deserialize)]
struct WireRoute {
    #[serde(default)]
    geometry: Option<WireGeometry>,
    #[serde(default)]
    legs: Vec<WireLeg>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    duration_typical: Option<f64>,
    #[serde(default)]
    distance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireGeometry {
    #[serde(default)]
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct WireLeg {
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    duration_typical: Option<f64>,
    #[serde(default)]
    distance: Option<f64>,
}

/// Parse a directions response body into the first route.
pub fn parse_directions(body: &str) -> Result<RouteResult, EtaError> {
    let response: DirectionsResponse = serde_json::from_str(body)?;
    if response.code != "Ok" {
        let detail = response
            .message
            .map(|m| format!("{}: {}", response.code, m))
            .unwrap_or(response.code);
        return Err(EtaError::NoRoute(detail));
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| EtaError::NoRoute("empty routes".to_string()))?;

    normalize_route(route)
}

fn normalize_route(route: WireRoute) -> Result<RouteResult, EtaError> {
    let duration = route
        .duration
        .or_else(|| sum_legs(&route.legs, |leg| leg.duration))
        .ok_or(EtaError::MissingDuration)?;
    let typical = route
        .duration_typical
        .or_else(|| sum_legs(&route.legs, |leg| leg.duration_typical));
    let distance = route
        .distance
        .or_else(|| sum_legs(&route.legs, |leg| leg.distance))
        .unwrap_or(0.0);

    let coordinates = route
        .geometry
        .map(|g| g.coordinates.into_iter().map(Coordinate::from_lng_lat).collect())
        .unwrap_or_default();

    Ok(RouteResult {
        coordinates,
        duration_seconds: duration,
        duration_typical_seconds: typical,
        distance_meters: distance,
    })
}

/// Sum a per-leg value; `None` unless every leg carries it.
fn sum_legs<F>(legs: &[WireLeg], field: F) -> Option<f64>
where
    F: Fn(&WireLeg) -> Option<f64>,
{
    if legs.is_empty() {
        return None;
    }
    legs.iter().map(field).sum()
}

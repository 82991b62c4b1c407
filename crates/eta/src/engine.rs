//! Estimate pipeline: credential check, provider call, extraction, scaling.

use fleetline_core::{Coordinate, RouteResult, RoutingConfig, TrafficEstimate};
use fleetline_rate_limit::{RateLimitDecision, RateLimitStore, RateLimiter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::EtaError;
use crate::extract::{self, LegacyLeg};
use crate::format::format_eta;
use crate::provider::{DirectionsProvider, RouteProvider};
use crate::vehicle::VehicleType;

/// Pickup to dropoff request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EtaRequest {
    /// Pickup (or current driver) position
    pub origin: Coordinate,
    /// Dropoff position
    pub destination: Coordinate,
    /// Vehicle class
    #[serde(default)]
    pub vehicle: VehicleType,
}

/// A successful estimate
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EtaEstimate {
    /// Vehicle-adjusted seconds to arrival
    pub eta_seconds: u64,
    /// Rendered ETA
    pub display: String,
    /// Traffic breakdown
    pub traffic: TrafficEstimate,
    /// Routed geometry and distance; absent for legacy-only estimates
    pub route: Option<RouteResult>,
    /// Heading of the first route segment, for orienting the driver marker
    pub initial_heading: Option<f64>,
}

/// Outcome of an admitted [`EtaEngine::estimate_for`] call
#[derive(Debug, Clone, PartialEq)]
pub struct GatedEstimate {
    /// Budget after counting this call; `None` when no gate is configured
    pub decision: Option<RateLimitDecision>,
    /// The estimate, if one could be produced
    pub estimate: Option<EtaEstimate>,
}

/// Per-caller gate in front of provider calls
pub struct RateGate<S = fleetline_rate_limit::InMemoryStore> {
    limiter: Arc<RateLimiter<S>>,
    limit: u32,
    window: Duration,
}

impl<S: RateLimitStore> RateGate<S> {
    /// Allow `limit` provider calls per `window` per caller
    pub fn new(limiter: Arc<RateLimiter<S>>, limit: u32, window: Duration) -> Self {
        Self {
            limiter,
            limit,
            window,
        }
    }

    /// Count one call for `identifier`
    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        self.limiter.check(identifier, self.limit, self.window)
    }
}

/// Traffic-aware ETA engine
pub struct EtaEngine<P, S = fleetline_rate_limit::InMemoryStore> {
    provider: P,
    access_token: Option<String>,
    gate: Option<RateGate<S>>,
}

impl EtaEngine<DirectionsProvider> {
    /// Engine over the directions API described by `config`
    pub fn from_config(config: &RoutingConfig) -> Result<Self, EtaError> {
        Ok(Self::new(
            DirectionsProvider::from_config(config)?,
            config.usable_token().map(str::to_string),
        ))
    }
}

impl<P: RouteProvider> EtaEngine<P> {
    /// Engine over `provider`; a missing or blank token disables estimates
    pub fn new(provider: P, access_token: Option<String>) -> Self {
        let access_token = access_token.filter(|t| !t.trim().is_empty());
        Self {
            provider,
            access_token,
            gate: None,
        }
    }
}

impl<P: RouteProvider, S: RateLimitStore> EtaEngine<P, S> {
    /// Put a per-caller rate gate in front of the provider
    pub fn with_rate_gate<S2: RateLimitStore>(self, gate: RateGate<S2>) -> EtaEngine<P, S2> {
        EtaEngine {
            provider: self.provider,
            access_token: self.access_token,
            gate: Some(gate),
        }
    }

    /// Whether a usable credential is configured
    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    /// Best-effort estimate; `None` when no estimate can be produced
    pub async fn estimate(&self, request: &EtaRequest) -> Option<EtaEstimate> {
        self.estimate_with_fallback(request, None).await
    }

    /// Estimate, falling back to a legacy leg when the route is unusable.
    ///
    /// A usable traffic-aware route always takes precedence over `legacy`.
    pub async fn estimate_with_fallback(
        &self,
        request: &EtaRequest,
        legacy: Option<&LegacyLeg>,
    ) -> Option<EtaEstimate> {
        let route = match self.fetch_route(request).await {
            Ok(route) => Some(route),
            Err(EtaError::MissingCredential) => {
                debug!("routing credential not configured; skipping estimate");
                None
            }
            Err(e) => {
                warn!(error = %e, origin = %request.origin, destination = %request.destination, "route request failed");
                None
            }
        };

        let traffic = extract::select(route.as_ref(), legacy)?;
        let eta_seconds = extract::eta_seconds(&traffic, request.vehicle)?;
        let initial_heading = route.as_ref().and_then(initial_heading);

        Some(EtaEstimate {
            eta_seconds,
            display: format_eta(Some(eta_seconds)),
            traffic,
            route,
            initial_heading,
        })
    }

    /// Gate on the caller's rate budget, then estimate.
    ///
    /// `Err` carries the denying decision and no provider call is made.
    /// Without a configured gate every call is admitted.
    pub async fn estimate_for(
        &self,
        identifier: &str,
        request: &EtaRequest,
    ) -> Result<GatedEstimate, RateLimitDecision> {
        let decision = self.gate.as_ref().map(|gate| gate.check(identifier));
        if let Some(denied) = decision.filter(|d| !d.success) {
            info!(identifier, reset = denied.reset, "ETA request rate limited");
            return Err(denied);
        }
        Ok(GatedEstimate {
            decision,
            estimate: self.estimate(request).await,
        })
    }

    /// Configured rate gate, if any
    pub fn gate(&self) -> Option<&RateGate<S>> {
        self.gate.as_ref()
    }

    async fn fetch_route(&self, request: &EtaRequest) -> Result<RouteResult, EtaError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(EtaError::MissingCredential)?;

        for coord in [request.origin, request.destination] {
            if !coord.is_valid() {
                return Err(EtaError::InvalidCoordinate(coord.to_string()));
            }
        }

        self.provider
            .route(request.origin, request.destination, token)
            .await
    }
}

fn initial_heading(route: &RouteResult) -> Option<f64> {
    let start = *route.coordinates.first()?;
    route
        .coordinates
        .iter()
        .skip(1)
        .find_map(|next| fleetline_geo::bearing(start, *next))
}

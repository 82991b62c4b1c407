use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use fleetline_core::Coordinate;
use fleetline_delivery_id::{format_delivery_id, CreatedAt};
use fleetline_eta::{EtaRequest, VehicleType, CALCULATING_PLACEHOLDER};
use fleetline_rate_limit::{client_identifier, RateLimitDecision};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::state::AppState;

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Deserialize)]
pub struct EtaBody {
    pub origin: Coordinate,
    pub destination: Coordinate,
    #[serde(default)]
    pub vehicle_type: Option<String>,
}

pub async fn estimate_eta(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<EtaBody>,
) -> Response {
    let identifier = client_identifier(
        header_str(&headers, "x-forwarded-for"),
        header_str(&headers, "x-real-ip"),
    );

    let request = EtaRequest {
        origin: body.origin,
        destination: body.destination,
        vehicle: body
            .vehicle_type
            .as_deref()
            .map(VehicleType::from_label)
            .unwrap_or_default(),
    };

    let admitted = match state.engine.estimate_for(&identifier, &request).await {
        Ok(admitted) => admitted,
        Err(denied) => {
            let retry_after = denied.retry_after_secs(now_ms());
            info!(%identifier, retry_after, "rejecting ETA request over rate limit");
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(denied)).into_response();
            insert_rate_headers(response.headers_mut(), &denied);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            return response;
        }
    };

    let payload = match admitted.estimate {
        Some(estimate) => {
            let route = estimate.route.as_ref();
            json!({
                "eta_seconds": estimate.eta_seconds,
                "display": estimate.display,
                "has_traffic_data": estimate.traffic.has_traffic_data,
                "distance_meters": route.map(|r| r.distance_meters),
                "coordinates": route.map(|r| &r.coordinates),
            })
        }
        None => {
            debug!(%identifier, "no ETA available");
            json!({
                "eta_seconds": Value::Null,
                "display": CALCULATING_PLACEHOLDER,
            })
        }
    };

    let mut response = Json(payload).into_response();
    if let Some(decision) = &admitted.decision {
        insert_rate_headers(response.headers_mut(), decision);
    }
    response
}

#[derive(Debug, Deserialize)]
pub struct DeliveryIdQuery {
    pub raw_id: Option<String>,
    pub created_at: Option<String>,
}

pub async fn delivery_id(Query(query): Query<DeliveryIdQuery>) -> Json<Value> {
    let created_at = query.created_at.map(CreatedAt::Text);
    let delivery_id = format_delivery_id(query.raw_id.as_deref(), created_at.as_ref());
    Json(json!({ "delivery_id": delivery_id }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn insert_rate_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(decision.reset));
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

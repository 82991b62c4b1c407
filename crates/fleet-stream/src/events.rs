//! Event-stream messages.
//!
//! Frames travel as JSON text: `{"event": "<name>", "data": <payload>}`.
//! Payload field names follow the dispatch server (`userId`,
//! `current_latitude`, `updated_at`, ...).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::TransportError;

/// Named channel on the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Session established
    Connected,
    /// Session ended
    Disconnected,
    /// Transport could not establish or lost the session
    ConnectionFailed,
    /// Full driver snapshot sent on join
    InitialDrivers,
    /// Driver went online
    DriverOnline,
    /// Driver went offline
    DriverOffline,
    /// Driver position sample
    DriverPositionUpdate,
    /// Order lifecycle change
    OrderStatusUpdate,
}

impl EventKind {
    /// Every kind, in wire-table order
    pub const ALL: [EventKind; 8] = [
        Self::Connected,
        Self::Disconnected,
        Self::ConnectionFailed,
        Self::InitialDrivers,
        Self::DriverOnline,
        Self::DriverOffline,
        Self::DriverPositionUpdate,
        Self::OrderStatusUpdate,
    ];

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::ConnectionFailed => "connection-failed",
            Self::InitialDrivers => "initial-drivers",
            Self::DriverOnline => "driver:online",
            Self::DriverOffline => "driver:offline",
            Self::DriverPositionUpdate => "driver:position:update",
            Self::OrderStatusUpdate => "order:status:update",
        }
    }

    /// Emitted by the supervisor from transport state, never taken from the wire
    pub fn is_lifecycle(self) -> bool {
        matches!(
            self,
            Self::Connected | Self::Disconnected | Self::ConnectionFailed
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TransportError::UnknownEvent(s.to_string()))
    }
}

/// Payload of `connection-failed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionFailure {
    /// What went wrong
    pub message: String,
    /// Endpoint that was being dialled
    pub url: String,
}

/// One entry of `initial-drivers`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverSnapshot {
    /// Driver user id
    #[serde(rename = "userId", deserialize_with = "string_or_number")]
    pub user_id: String,
    /// Driver online
    #[serde(default)]
    pub is_online: bool,
    /// Driver accepting orders
    #[serde(default)]
    pub is_available: bool,
    /// Last known latitude
    #[serde(default)]
    pub current_latitude: Option<f64>,
    /// Last known longitude
    #[serde(default)]
    pub current_longitude: Option<f64>,
    /// When the position was recorded
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Payload of `driver:online`, `driver:offline` and `driver:position:update`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverUpdate {
    /// Driver user id
    #[serde(rename = "userId", deserialize_with = "string_or_number")]
    pub user_id: String,
    /// Availability, when the server includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
    /// Latitude, when the event carries a position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_latitude: Option<f64>,
    /// Longitude, when the event carries a position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_longitude: Option<f64>,
    /// When the position was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl DriverUpdate {
    /// Bare update for `user_id`
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_available: None,
            current_latitude: None,
            current_longitude: None,
            updated_at: None,
        }
    }

    /// Update carrying a position
    pub fn with_position(mut self, lat: f64, lng: f64, updated_at: DateTime<Utc>) -> Self {
        self.current_latitude = Some(lat);
        self.current_longitude = Some(lng);
        self.updated_at = Some(updated_at.to_rfc3339());
        self
    }
}

/// Payload of `order:status:update`.
///
/// The server sends a nested order/user/driver/pickup/dropoff/location
/// document; it is kept as-is with typed accessors for the fields the
/// fleet view reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OrderStatusUpdate {
    /// Raw document
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl OrderStatusUpdate {
    /// Order id from `order.id`, `orderId` or `id`
    pub fn order_id(&self) -> Option<String> {
        self.order_field("id")
            .or_else(|| self.payload.get("orderId"))
            .or_else(|| self.payload.get("id"))
            .and_then(value_to_string)
    }

    /// Status from `order.status` or `status`
    pub fn status(&self) -> Option<&str> {
        self.order_field("status")
            .or_else(|| self.payload.get("status"))
            .and_then(Value::as_str)
    }

    /// Driver id from `driver.id`, `driver.userId` or `driverId`
    pub fn driver_id(&self) -> Option<String> {
        let driver = self.payload.get("driver");
        driver
            .and_then(|d| d.get("id").or_else(|| d.get("userId")))
            .or_else(|| self.payload.get("driverId"))
            .and_then(value_to_string)
    }

    /// Courier location from `location.{latitude,longitude}` or `location.{lat,lng}`
    pub fn location(&self) -> Option<(f64, f64)> {
        let location = self.payload.get("location")?;
        let lat = location
            .get("latitude")
            .or_else(|| location.get("lat"))?
            .as_f64()?;
        let lng = location
            .get("longitude")
            .or_else(|| location.get("lng"))?
            .as_f64()?;
        Some((lat, lng))
    }

    fn order_field(&self, field: &str) -> Option<&Value> {
        self.payload.get("order").and_then(|order| order.get(field))
    }
}

/// Everything the stream can deliver to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Session established
    Connected,
    /// Session ended
    Disconnected,
    /// Transport failure
    ConnectionFailed(ConnectionFailure),
    /// Driver snapshot on join
    InitialDrivers(Vec<DriverSnapshot>),
    /// Driver went online
    DriverOnline(DriverUpdate),
    /// Driver went offline
    DriverOffline(DriverUpdate),
    /// Driver position sample
    DriverPositionUpdate(DriverUpdate),
    /// Order lifecycle change
    OrderStatusUpdate(OrderStatusUpdate),
}

impl StreamEvent {
    /// Channel this event is delivered on
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::ConnectionFailed(_) => EventKind::ConnectionFailed,
            Self::InitialDrivers(_) => EventKind::InitialDrivers,
            Self::DriverOnline(_) => EventKind::DriverOnline,
            Self::DriverOffline(_) => EventKind::DriverOffline,
            Self::DriverPositionUpdate(_) => EventKind::DriverPositionUpdate,
            Self::OrderStatusUpdate(_) => EventKind::OrderStatusUpdate,
        }
    }

    fn data(&self) -> Result<Value, TransportError> {
        let value = match self {
            Self::Connected | Self::Disconnected => Value::Null,
            Self::ConnectionFailed(failure) => serde_json::to_value(failure)?,
            Self::InitialDrivers(drivers) => serde_json::to_value(drivers)?,
            Self::DriverOnline(update)
            | Self::DriverOffline(update)
            | Self::DriverPositionUpdate(update) => serde_json::to_value(update)?,
            Self::OrderStatusUpdate(order) => serde_json::to_value(order)?,
        };
        Ok(value)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Decode one text frame
pub fn decode_frame(text: &str) -> Result<StreamEvent, TransportError> {
    let frame: WireFrame = serde_json::from_str(text)?;
    let kind: EventKind = frame.event.parse()?;
    let data = frame.data;

    let event = match kind {
        EventKind::Connected => StreamEvent::Connected,
        EventKind::Disconnected => StreamEvent::Disconnected,
        EventKind::ConnectionFailed => StreamEvent::ConnectionFailed(serde_json::from_value(data)?),
        EventKind::InitialDrivers => StreamEvent::InitialDrivers(serde_json::from_value(data)?),
        EventKind::DriverOnline => StreamEvent::DriverOnline(serde_json::from_value(data)?),
        EventKind::DriverOffline => StreamEvent::DriverOffline(serde_json::from_value(data)?),
        EventKind::DriverPositionUpdate => {
            StreamEvent::DriverPositionUpdate(serde_json::from_value(data)?)
        }
        EventKind::OrderStatusUpdate => {
            StreamEvent::OrderStatusUpdate(serde_json::from_value(data)?)
        }
    };
    Ok(event)
}

/// Encode one event as a text frame
pub fn encode_frame(event: &StreamEvent) -> Result<String, TransportError> {
    let frame = WireFrame {
        event: event.kind().as_str().to_string(),
        data: event.data()?,
    };
    Ok(serde_json::to_string(&frame)?)
}

/// Parse a server `updated_at`: RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS` taken as UTC
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .into_iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(text, pattern).ok())
        .map(|naive| naive.and_utc())
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_string(&value).ok_or_else(|| serde::de::Error::custom("expected string or number id"))
}

//! Fleetline Fleet Stream
//!
//! Client side of the dispatch event stream: one supervised WebSocket
//! session, a named-channel event bus, and a live driver view with
//! out-of-order protection and bearing-derived headings.

#![warn(missing_docs)]

pub mod bus;
pub mod error;
pub mod events;
pub mod fleet;
pub mod ingest;
pub mod supervisor;
pub mod websocket;

pub use bus::{EventBus, Handler, Subscription};
pub use error::TransportError;
pub use events::{
    decode_frame, encode_frame, parse_timestamp, ConnectionFailure, DriverSnapshot, DriverUpdate,
    EventKind, OrderStatusUpdate, StreamEvent,
};
pub use fleet::LiveFleet;
pub use ingest::{IngestOutcome, PositionTracker, TrackedDriver};
pub use supervisor::{ConnectionSupervisor, Transport, TransportLink};
pub use websocket::WsTransport;

//! Traffic-aware arrival estimates.
//!
//! The engine asks a routing provider for a driving route weighted by live
//! traffic, reduces it to a provider-neutral [`TrafficEstimate`], scales the
//! duration for the vehicle class and renders a display string.
//!
//! Estimates are best effort. A missing credential, a provider outage or a
//! malformed response all yield `None`; nothing here returns an error to a
//! rendering surface.
//!
//! [`TrafficEstimate`]: fleetline_core::TrafficEstimate

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod extract;
pub mod format;
pub mod latest;
pub mod provider;
pub mod vehicle;

pub use engine::{EtaEngine, EtaEstimate, EtaRequest, GatedEstimate, RateGate};
pub use error::EtaError;
pub use extract::{LegacyLeg, LegacyValue};
pub use format::{format_eta, CALCULATING_PLACEHOLDER};
pub use latest::{LatestEta, RequestTicket};
pub use provider::{DirectionsProvider, RouteProvider};
pub use vehicle::VehicleType;

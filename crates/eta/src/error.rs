//! ETA error types

use thiserror::Error;

/// Failures inside the estimate pipeline.
///
/// These stay internal to the engine, which logs them and reports "no
/// estimate" to its callers.
#[derive(Debug, Error)]
pub enum EtaError {
    /// No usable provider credential is configured
    #[error("Routing credential not configured")]
    MissingCredential,

    /// Origin or destination out of range
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Transport-level failure talking to the provider
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success HTTP status
    #[error("Provider returned HTTP {0}")]
    Status(u16),

    /// Provider body is not the expected JSON
    #[error("Malformed provider response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Provider reported no drivable route
    #[error("No route: {0}")]
    NoRoute(String),

    /// Route carries no usable duration
    #[error("Route has no duration")]
    MissingDuration,
}

//! Core error types

use thiserror::Error;

/// Core error type for Fleetline
#[derive(Debug, Error)]
pub enum CoreError {
    /// Coordinate outside the valid latitude/longitude range
    #[error("Invalid coordinate: lat={lat}, lng={lng}")]
    InvalidCoordinate {
        /// Offending latitude
        lat: f64,
        /// Offending longitude
        lng: f64,
    },
}

/// Result alias over [`CoreError`]
pub type Result<T> = std::result::Result<T, CoreError>;

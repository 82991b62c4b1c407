//! Vehicle classes and their duration multipliers

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Vehicle class used to scale routed durations.
///
/// Routing profiles assume a passenger car; two-wheelers filter through
/// traffic faster and heavy vehicles run slower.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    /// Bicycle, motorcycle, scooter
    TwoWheeler,
    /// Car or small van
    #[default]
    Car,
    /// Truck-class vehicle
    Truck,
}

impl VehicleType {
    /// Multiplier applied to the routed duration
    pub fn multiplier(self) -> f64 {
        match self {
            Self::TwoWheeler => 0.8,
            Self::Car => 1.0,
            Self::Truck => 1.3,
        }
    }

    /// Classify a free-form label, defaulting to [`VehicleType::Car`]
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

impl FromStr for VehicleType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two_wheeler" | "bike" | "bicycle" | "motorbike" | "motorcycle" | "moto"
            | "scooter" => Ok(Self::TwoWheeler),
            "car" | "sedan" | "van" | "minivan" => Ok(Self::Car),
            "truck" | "lorry" | "pickup" | "heavy" => Ok(Self::Truck),
            _ => Err(()),
        }
    }
}

use std::env;

use fleetline_core::Config as FleetlineConfig;

const DEFAULT_PORT: u16 = 8090;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub fleetline: FleetlineConfig,
}

impl Config {
    /// Reads `FLEETLINE_CONFIG` (optional TOML path) and `PORT`, then the
    /// `FLEETLINE_*` overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        let path = env::var("FLEETLINE_CONFIG").ok();
        let fleetline = FleetlineConfig::load(path.as_deref())?;
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(Config { port, fleetline })
    }
}

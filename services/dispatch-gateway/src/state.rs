use std::sync::Arc;
use std::time::Duration;

use fleetline_eta::{DirectionsProvider, EtaEngine, RateGate, RouteProvider};
use fleetline_rate_limit::{InMemoryStore, RateLimiter};

use crate::config::Config;

pub struct AppState {
    pub engine: EtaEngine<Arc<dyn RouteProvider>, InMemoryStore>,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let routing = &config.fleetline.routing;
        let provider: Arc<dyn RouteProvider> = Arc::new(DirectionsProvider::from_config(routing)?);
        Ok(Self::with_provider(config, provider))
    }

    pub fn with_provider(config: &Config, provider: Arc<dyn RouteProvider>) -> Self {
        let routing = &config.fleetline.routing;
        let limits = &config.fleetline.rate_limit;

        let limiter = Arc::new(RateLimiter::with_eviction_threshold(
            InMemoryStore::new(),
            limits.eviction_threshold,
        ));
        let gate = RateGate::new(limiter, limits.limit, Duration::from_secs(limits.window_secs));

        AppState {
            engine: EtaEngine::new(provider, routing.usable_token().map(str::to_string))
                .with_rate_gate(gate),
        }
    }
}

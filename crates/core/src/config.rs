//! Configuration management for Fleetline.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable overriding [`StreamConfig::url`].
pub const ENV_STREAM_URL: &str = "FLEETLINE_STREAM_URL";
/// Environment variable overriding [`RoutingConfig::access_token`].
pub const ENV_ROUTING_TOKEN: &str = "FLEETLINE_ROUTING_TOKEN";
/// Environment variable overriding [`RoutingConfig::base_url`].
pub const ENV_ROUTING_BASE_URL: &str = "FLEETLINE_ROUTING_BASE_URL";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for [`Config`]
    #[cfg(feature = "toml")]
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Event-stream connection settings
    pub stream: StreamConfig,
    /// Routing provider settings
    pub routing: RoutingConfig,
    /// Outbound call rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Event-stream connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    /// WebSocket URL of the dispatch server
    pub url: String,
}

/// Routing provider settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingConfig {
    /// Provider directions endpoint, without the profile segment
    pub base_url: String,
    /// Provider access token; absent or blank disables estimates
    #[serde(default)]
    pub access_token: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Fixed-window limiter settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub limit: u32,
    /// Window length in seconds
    pub window_secs: u64,
    /// Store size above which expired records are swept
    pub eviction_threshold: usize,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 30,
            window_secs: 60,
            eviction_threshold: 1000,
        }
    }
}

impl RoutingConfig {
    /// Token usable for provider calls, if any.
    ///
    /// Blank tokens are treated as missing.
    pub fn usable_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

impl Config {
    /// Load configuration from a TOML file
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path` when it exists, otherwise start from defaults, then
    /// apply environment overrides.
    #[cfg(feature = "toml")]
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.as_ref().exists() => Self::from_file(p)?,
            _ => Self::default_config(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `FLEETLINE_*` environment overrides in place
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_STREAM_URL) {
            self.stream.url = url;
        }
        if let Some(token) = lookup(ENV_ROUTING_TOKEN) {
            self.routing.access_token = Some(token);
        }
        if let Some(base) = lookup(ENV_ROUTING_BASE_URL) {
            self.routing.base_url = base;
        }
    }

    /// Built-in defaults (local dispatch server, no routing credential)
    pub fn default_config() -> Self {
        Self {
            stream: StreamConfig {
                url: "ws://127.0.0.1:4000/stream".to_string(),
            },
            routing: RoutingConfig {
                base_url: "https://api.mapbox.com/directions/v5/mapbox".to_string(),
                access_token: None,
                timeout_secs: default_timeout_secs(),
            },
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

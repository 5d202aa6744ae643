use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::endpoint::Endpoint;
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Client settings, usually read from a TOML file:
///
/// ```toml
/// endpoint = "ws://127.0.0.1:3031/ws"
///
/// [retry]
/// initial_delay_ms = 250
/// max_delay_ms = 5000
/// multiplier = 2.0
/// mode = "until_first_success"   # or "always"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: Option<String>,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// An explicit override (query parameter or CLI flag) wins over the
    /// configured endpoint, which wins over the default.
    pub fn resolve_endpoint(&self, explicit: Option<&str>) -> Endpoint {
        let explicit = explicit.map(str::trim).filter(|s| !s.is_empty());
        Endpoint::resolve(explicit.or(self.endpoint.as_deref()))
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:3031/ws";

/// Address of the streaming data source. Opaque to the client: no URL
/// validation happens here, the transport reports bad addresses as
/// connection failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Resolve from an optional override (the `ws` query parameter or a
    /// command-line flag). Missing, empty, or whitespace-only values fall
    /// back to [`DEFAULT_ENDPOINT`].
    pub fn resolve(candidate: Option<&str>) -> Self {
        match candidate.map(str::trim) {
            Some(address) if !address.is_empty() => Self::new(address),
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Whether automatic retries continue after a connection has been
/// established at least once for the current endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectMode {
    /// Retry until the first successful open. A later drop is reported as
    /// disconnected and waits for an explicit reconnect.
    #[default]
    UntilFirstSuccess,
    /// Retry after every failure, with backoff.
    Always,
}

/// Capped exponential backoff between connection attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub mode: ReconnectMode,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 250,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            mode: ReconnectMode::UntilFirstSuccess,
        }
    }
}

impl RetryPolicy {
    /// A constant delay between attempts.
    pub fn fixed(delay: Duration, mode: ReconnectMode) -> Self {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        Self {
            initial_delay_ms: ms,
            max_delay_ms: ms,
            multiplier: 1.0,
            mode,
        }
    }

    /// Delay before the next attempt after `failures` consecutive failures
    /// (the first failure is `1`).
    ///
    /// Never below 1ms and never above `max(max_delay_ms, initial_delay_ms)`.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let initial = self.initial_delay_ms.max(1);
        let cap = self.max_delay_ms.max(initial);
        let multiplier = if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            1.0
        };
        let exponent = failures.saturating_sub(1).min(64) as i32;
        let scaled = initial as f64 * multiplier.powi(exponent);
        let ms = if scaled.is_finite() && scaled < cap as f64 {
            scaled as u64
        } else {
            cap
        };
        Duration::from_millis(ms)
    }

    /// Whether a failure should schedule another attempt.
    pub fn should_retry(&self, ever_connected: bool) -> bool {
        match self.mode {
            ReconnectMode::UntilFirstSuccess => !ever_connected,
            ReconnectMode::Always => true,
        }
    }
}

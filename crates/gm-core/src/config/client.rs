//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_millis;

/// Configuration for the device client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the controller, e.g. `ws://gaggimate.local/ws`
    pub device_url: String,

    /// Backoff configuration for reconnections
    pub backoff: BackoffConfig,

    /// Upper bound for a single connection attempt
    #[serde(with = "duration_millis")]
    pub connect_timeout: Duration,

    /// Buffer size of the lifecycle event channel
    pub event_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device_url: "ws://gaggimate.local/ws".to_string(),
            backoff: BackoffConfig::default(),
            connect_timeout: Duration::from_secs(10),
            event_channel_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Point the client at a host. A bare host name or `host:port` is
    /// expanded to the controller's `/ws` endpoint; a full URL is kept.
    pub fn set_device(&mut self, target: &str) {
        self.device_url = if target.contains("://") {
            target.to_string()
        } else {
            format!("ws://{}/ws", target.trim_end_matches('/'))
        };
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_millis")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_millis")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1000),
            max: Duration::from_millis(30_000),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_device_expands_host() {
        let mut config = ClientConfig::default();
        config.set_device("192.168.4.1");
        assert_eq!(config.device_url, "ws://192.168.4.1/ws");

        config.set_device("gaggimate.local:8080/");
        assert_eq!(config.device_url, "ws://gaggimate.local:8080/ws");

        config.set_device("wss://machine.example/ws");
        assert_eq!(config.device_url, "wss://machine.example/ws");
    }
}

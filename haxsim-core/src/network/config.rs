//! Session Configuration
//!
//! Protocol constants for both roles. Every field has a default, so JSON
//! overrides only need the keys they change.

use serde::{Serialize, Deserialize};

use super::NetworkError;

/// Host-side configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Frames between receipt and application of delayed actions
    pub input_delay: u32,
    /// Ticks between full snapshots
    pub snapshot_interval: u32,
    /// Ticks between acknowledgements
    pub ack_interval: u32,
    /// Ticks between checksum broadcasts
    pub checksum_interval: u32,
    /// Most ticks stepped by a single `advance` call
    pub max_catch_up: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::TICK_RATE,
            input_delay: 2,
            snapshot_interval: 600,
            ack_interval: 7,
            checksum_interval: 60,
            max_catch_up: 120,
        }
    }
}

impl HostConfig {
    /// Milliseconds per tick.
    pub fn tick_ms(&self) -> f64 {
        1000.0 / self.tick_rate.max(1) as f64
    }

    /// Parse from JSON, filling missing fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self, NetworkError> {
        serde_json::from_str(json).map_err(|e| NetworkError::Config(e.to_string()))
    }
}

/// Client-side configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Stored ping samples
    pub ping_capacity: usize,
    /// Weight multiplier applied to older samples on every new one
    pub ping_decay: f64,
    /// Fixed extrapolation in ms, overriding the ping-based one
    pub manual_extrapolation_ms: Option<f64>,
    /// Render calls closer together than this are skipped
    pub min_frame_interval_ms: f64,
    /// Silence after which the host is considered gone
    pub timeout_ms: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::TICK_RATE,
            ping_capacity: 32,
            ping_decay: 0.97,
            manual_extrapolation_ms: None,
            min_frame_interval_ms: 0.0,
            timeout_ms: 15_000.0,
        }
    }
}

impl ClientConfig {
    /// Milliseconds per tick.
    pub fn tick_ms(&self) -> f64 {
        1000.0 / self.tick_rate.max(1) as f64
    }

    /// Parse from JSON, filling missing fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self, NetworkError> {
        serde_json::from_str(json).map_err(|e| NetworkError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = HostConfig::from_json_str(r#"{ "snapshot_interval": 300 }"#).unwrap();
        assert_eq!(cfg.snapshot_interval, 300);
        assert_eq!(cfg.ack_interval, 7);
        assert!((cfg.tick_ms() - 1000.0 / 60.0).abs() < 1e-12);

        let client = ClientConfig::from_json_str(r#"{ "manual_extrapolation_ms": 80 }"#).unwrap();
        assert_eq!(client.manual_extrapolation_ms, Some(80.0));
        assert_eq!(client.ping_capacity, 32);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        assert!(matches!(
            HostConfig::from_json_str("{ tick_rate: }"),
            Err(NetworkError::Config(_))
        ));
    }
}

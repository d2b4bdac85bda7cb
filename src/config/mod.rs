// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Node configuration.
//!
//! A typed settings tree with explicit defaults, overlaid by a TOML file
//! once at startup: every struct carries `#[serde(default)]`, so a config
//! file only states what differs from the defaults and a missing file is
//! simply the defaults. CLI flags are applied on top by `main`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::detection::Thresholds;

/// Main node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node identity.
    pub node: NodeConfig,
    /// Sensor streams and buffer sizing.
    pub sensors: SensorsConfig,
    /// Detector weight bands and thresholds.
    pub detector: Thresholds,
    /// Heartbeat cadence.
    pub watchdog: WatchdogConfig,
    /// Platform uplink transport.
    pub uplink: UplinkConfig,
    /// Remote sensor transport.
    pub link: LinkConfig,
}

/// Identity stamped onto every published record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node id; also the uplink topic.
    pub sensor_id: String,
    /// Node type tag.
    pub sensor_type: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sensor_id: "csn-node-test".to_string(),
            sensor_type: "coffee_pot".to_string(),
        }
    }
}

/// Sensor identities and buffer sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    /// Weight (scale) sensor id.
    pub weight_sensor_id: String,
    /// Grinder smart-plug sensor id.
    pub grind_sensor_id: String,
    /// Brewer smart-plug sensor id.
    pub brew_sensor_id: String,
    /// Capacity of each raw sample buffer.
    pub sample_buffer_size: usize,
    /// Capacity of the event history buffer.
    pub event_buffer_size: usize,
    /// Capacity of the weight statistics buffer.
    pub stats_buffer_size: usize,
    /// Aggregation cycle of the weight statistics buffer, seconds.
    pub stats_duration_secs: f64,
    /// Target period between scale readings, milliseconds.
    pub read_period_ms: u64,
    /// Floor for the self-correcting sleep, milliseconds.
    pub min_sleep_ms: u64,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            weight_sensor_id: "csn-node-test-weight".to_string(),
            grind_sensor_id: "csn-node-test-a".to_string(),
            brew_sensor_id: "csn-node-test-b".to_string(),
            sample_buffer_size: 1000,
            event_buffer_size: 1000,
            stats_buffer_size: 1000,
            stats_duration_secs: 1.0,
            read_period_ms: 100,
            min_sleep_ms: 10,
        }
    }
}

/// Heartbeat cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Seconds between status heartbeats.
    pub period_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { period_secs: 30 }
    }
}

/// Platform uplink transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UplinkConfig {
    /// Publish to a broker; when false the node logs records instead.
    pub enabled: bool,
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// MQTT client id.
    pub client_id: String,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 1883,
            client_id: "brewsense-uplink".to_string(),
        }
    }
}

/// Remote sensor transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Subscribe to the plug telemetry broker; when false the node feeds
    /// the remote sensors from the built-in simulator.
    pub enabled: bool,
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// MQTT client id prefix (the sensor id is appended).
    pub client_id: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 1883,
            client_id: "brewsense-node".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, overlaying the defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("{}: {e}", path.display())))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("{}: {e}", path.display())))?;
        info!("loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load from a file when one is given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> crate::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.node.sensor_id, "csn-node-test");
        assert_eq!(config.sensors.read_period_ms, 100);
        assert_eq!(config.detector.empty_weight, 1630.0);
        assert_eq!(config.watchdog.period_secs, 30);
        assert!(!config.uplink.enabled);
    }

    #[test]
    fn test_partial_file_overlays_defaults() {
        let text = r#"
            [node]
            sensor_id = "pot-under-test"

            [detector]
            full_weight = 3000.0

            [uplink]
            enabled = true
            host = "broker.example"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        // Stated values override...
        assert_eq!(config.node.sensor_id, "pot-under-test");
        assert_eq!(config.detector.full_weight, 3000.0);
        assert!(config.uplink.enabled);
        assert_eq!(config.uplink.host, "broker.example");
        // ...everything else keeps its default.
        assert_eq!(config.node.sensor_type, "coffee_pot");
        assert_eq!(config.detector.full_margin, 400.0);
        assert_eq!(config.uplink.port, 1883);
        assert_eq!(config.sensors.weight_sensor_id, "csn-node-test-weight");
    }

    #[test]
    fn test_malformed_file_is_a_config_error() {
        let path = std::env::temp_dir().join("brewsense_bad_config.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
        std::fs::remove_file(&path).ok();
    }
}

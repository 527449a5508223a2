//! Configuration model

use std::time::Duration;

use mix_protocol::NoiseReduction;
use serde::{Deserialize, Serialize};

use crate::mapping::Mapping;

/// Port name that asks the engine to find the controller itself
pub const AUTO_PORT: &str = "auto";

/// Serial connection parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SerialConnectionInfo {
    /// Port name, or `"auto"` to probe candidates
    #[serde(default = "default_com_port")]
    pub com_port: String,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_com_port() -> String {
    AUTO_PORT.to_string()
}

fn default_baud_rate() -> u32 {
    115200
}

impl SerialConnectionInfo {
    /// Whether the port must be found by detection
    pub fn is_auto(&self) -> bool {
        self.com_port.eq_ignore_ascii_case(AUTO_PORT)
    }
}

impl Default for SerialConnectionInfo {
    fn default() -> Self {
        Self {
            com_port: default_com_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

/// Session cache refresh timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRefreshSettings {
    /// Non-forced refreshes closer together than this are skipped
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// A cache older than this is refreshed before handling an event
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// Period of the orchestrator's unconditional refresh
    #[serde(default = "default_restart_interval_secs")]
    pub restart_interval_secs: u64,
}

fn default_min_interval_ms() -> u64 {
    5000
}

fn default_max_interval_ms() -> u64 {
    45000
}

fn default_restart_interval_secs() -> u64 {
    7200
}

impl SessionRefreshSettings {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn restart_interval(&self) -> Duration {
        Duration::from_secs(self.restart_interval_secs)
    }
}

impl Default for SessionRefreshSettings {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            restart_interval_secs: default_restart_interval_secs(),
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Slider index to targets
    #[serde(default)]
    pub slider_mapping: Mapping<usize>,
    /// Mute button index to targets
    #[serde(default)]
    pub mute_button_mapping: Mapping<usize>,
    /// Output device index to friendly names
    #[serde(default)]
    pub available_output_device: Mapping<i32>,
    #[serde(default)]
    pub serial_connection_info: SerialConnectionInfo,
    #[serde(default)]
    pub noise_reduction: NoiseReduction,
    /// Flip every slider so the top of travel is 0.0
    #[serde(default)]
    pub invert_sliders: bool,
    #[serde(default)]
    pub session_refresh: SessionRefreshSettings,
}

impl Config {
    /// Parse a config from JSON text
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Render as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Number of sliders the controller is expected to report
    pub fn num_sliders(&self) -> usize {
        self.slider_mapping.num_sliders()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.serial_connection_info.com_port, "auto");
        assert_eq!(config.serial_connection_info.baud_rate, 115200);
        assert_eq!(config.noise_reduction, NoiseReduction::Default);
        assert!(!config.invert_sliders);
        assert_eq!(config.session_refresh.min_interval(), Duration::from_secs(5));
        assert_eq!(config.session_refresh.max_interval(), Duration::from_secs(45));
        assert_eq!(
            config.session_refresh.restart_interval(),
            Duration::from_secs(2 * 60 * 60)
        );
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_json(
            r#"{
                "slider_mapping": { "0": "master", "1": ["chrome.exe", "mix.current"] },
                "mute_button_mapping": { "0": "mic" },
                "available_output_device": { "0": "Speakers (Realtek Audio)", "1": "Headphones" },
                "serial_connection_info": { "com_port": "COM7", "baud_rate": 9600 },
                "noise_reduction": "high",
                "invert_sliders": true,
                "session_refresh": { "min_interval_ms": 100 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.num_sliders(), 2);
        assert_eq!(config.mute_button_mapping.len(), 1);
        assert_eq!(
            config.available_output_device.get(&1),
            Some(&["Headphones".to_string()][..])
        );
        assert!(!config.serial_connection_info.is_auto());
        assert_eq!(config.serial_connection_info.baud_rate, 9600);
        assert_eq!(config.noise_reduction, NoiseReduction::High);
        assert!(config.invert_sliders);
        assert_eq!(config.session_refresh.min_interval_ms, 100);
        assert_eq!(config.session_refresh.max_interval_ms, 45000);
    }

    #[test]
    fn test_auto_port_case_insensitive() {
        let info = SerialConnectionInfo {
            com_port: "AUTO".to_string(),
            baud_rate: 9600,
        };
        assert!(info.is_auto());
    }

    #[test]
    fn test_unknown_noise_level_rejected() {
        assert!(Config::from_json(r#"{ "noise_reduction": "extreme" }"#).is_err());
    }

    #[test]
    fn test_json_roundtrip_preserves_lists() {
        let mut config = Config::default();
        config
            .slider_mapping
            .insert(2, vec!["a.exe".to_string(), "b.exe".to_string()]);
        let back = Config::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}

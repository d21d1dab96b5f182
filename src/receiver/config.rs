use super::derive::{DEFAULT_SEA_LEVEL_HPA, SENSOR_KEYS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Receiver settings from `config.json`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// BCM GPIO number driving the radio's CE line.
    pub radio_ce_pin: u8,
    /// SPI0 chip select, 0 or 1.
    pub radio_csn_pin: u8,
    pub radio_channel: u8,
    pub openhab_url: String,
    /// Sensor key → openHAB item name.
    pub openhab_items: BTreeMap<String, String>,
    pub sea_level_pressure: f64,
    /// Delay between radio polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Timeout of each REST call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        let items = [
            ("temp", "WeatherStation_Temperature"),
            ("pressure", "WeatherStation_Pressure"),
            ("altitude", "WeatherStation_Altitude"),
            ("humidity", "WeatherStation_Humidity"),
            ("wind_direction_deg", "WeatherStation_WindDirection"),
            ("wind_speed", "WeatherStation_WindSpeed"),
        ];
        Self {
            radio_ce_pin: 22,
            radio_csn_pin: 0,
            radio_channel: 76,
            openhab_url: "http://localhost:8080".to_string(),
            openhab_items: items
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            sea_level_pressure: DEFAULT_SEA_LEVEL_HPA,
            poll_interval_ms: 10,
            request_timeout_secs: 5,
        }
    }
}

impl ReceiverConfig {
    /// Missing file: defaults. Unreadable or malformed file: error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in config file {}", path.display()))?;
        config.warn_unknown_keys();
        Ok(config)
    }

    fn warn_unknown_keys(&self) {
        for key in self.openhab_items.keys() {
            if !SENSOR_KEYS.contains(&key.as_str()) {
                tracing::warn!(
                    "openhab_items maps unknown sensor key '{}'; known keys: {}",
                    key,
                    SENSOR_KEYS.join(", ")
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config: ReceiverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ReceiverConfig::default());
        assert_eq!(config.radio_channel, 76);
        assert_eq!(config.openhab_items["temp"], "WeatherStation_Temperature");
    }

    #[test]
    fn item_map_replaces_defaults() {
        let config: ReceiverConfig = serde_json::from_str(
            r#"{"radio_ce_pin": 25, "openhab_url": "http://openhab:8080",
                "openhab_items": {"pressure_hpa": "Barometer"}}"#,
        )
        .unwrap();
        assert_eq!(config.radio_ce_pin, 25);
        assert_eq!(config.radio_csn_pin, 0);
        assert_eq!(config.openhab_items.len(), 1);
        assert_eq!(config.openhab_items["pressure_hpa"], "Barometer");
    }

    #[test]
    fn missing_file_uses_defaults_and_bad_json_fails() {
        let dir = std::env::temp_dir().join(format!("wxstation-receiver-cfg-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let missing = ReceiverConfig::load(&dir.join("absent.json")).unwrap();
        assert_eq!(missing, ReceiverConfig::default());

        let bad = dir.join("bad.json");
        fs::write(&bad, "{ radio_channel: 76").unwrap();
        assert!(ReceiverConfig::load(&bad).is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}

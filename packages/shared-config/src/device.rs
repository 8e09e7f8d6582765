//! Playback device configuration

use crate::{get_env_or_default, parse_env, ConfigError, ConfigResult};

/// Local playback device configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Name the device announces to the playback provider
    pub name: String,

    /// Fixed device identifier (generated by the device when unset)
    pub device_id: Option<String>,

    /// Initial volume (0.0 - 1.0)
    pub volume: f32,
}

impl DeviceConfig {
    /// Load device configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let volume: f32 = parse_env("PARTYLINE_DEVICE_VOLUME", 1.0)?;
        if !(0.0..=1.0).contains(&volume) {
            return Err(ConfigError::InvalidValue(
                "PARTYLINE_DEVICE_VOLUME".to_string(),
                format!("{} is outside 0.0 - 1.0", volume),
            ));
        }

        Ok(Self {
            name: get_env_or_default("PARTYLINE_DEVICE_NAME", "Partyline"),
            device_id: std::env::var("PARTYLINE_DEVICE_ID")
                .ok()
                .filter(|id| !id.is_empty()),
            volume,
        })
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "Partyline".to_string(),
            device_id: None,
            volume: 1.0,
        }
    }
}

//! Shared configuration types for Partyline clients
//!
//! This crate provides the configuration used by the Partyline client
//! crates: where the party server lives, how to reach the room channel,
//! and how the local playback device announces itself.

mod channel;
mod device;
mod error;
mod server;

pub use channel::ChannelConfig;
pub use device::DeviceConfig;
pub use error::{ConfigError, ConfigResult};
pub use server::ServerConfig;

use std::env;

/// Complete client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Party server HTTP API configuration
    pub server: ServerConfig,

    /// Room channel configuration
    pub channel: ChannelConfig,

    /// Local playback device configuration
    pub device: DeviceConfig,

    /// Environment mode (development or production)
    pub environment: Environment,

    /// Log level (from RUST_LOG or LOG_LEVEL, otherwise per environment)
    pub log_level: String,
}

/// Application environment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        })
    }
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Log level used when neither RUST_LOG nor LOG_LEVEL is set
    pub fn default_log_level(&self) -> &'static str {
        if self.is_production() {
            "info"
        } else {
            "debug"
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl ClientConfig {
    /// Load client configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let server = ServerConfig::from_env()?;
        let channel = ChannelConfig::from_env(&server.base_url)?;

        let environment: Environment = get_env_or_default("ENVIRONMENT", "development")
            .parse()
            .unwrap_or_default();

        Ok(Self {
            server,
            channel,
            device: DeviceConfig::from_env()?,
            environment,
            log_level: env::var("RUST_LOG")
                .or_else(|_| env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| environment.default_log_level().to_string()),
        })
    }
}

/// Helper function to get an optional environment variable with a default
pub fn get_env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Helper function to parse an environment variable into a specific type
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

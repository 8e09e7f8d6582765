//! Party server (HTTP API) configuration

use crate::{get_env_or_default, parse_env, ConfigError, ConfigResult};

/// Default party server URL
const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// HTTP API configuration for the party server
#[derive(Clone)]
pub struct ServerConfig {
    /// Base URL of the party server (e.g., https://party.example.com)
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Bearer token attached to every request (optional)
    pub auth_token: Option<String>,

    /// User agent sent with every request
    pub user_agent: String,
}

impl ServerConfig {
    /// Load server configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let base_url = get_env_or_default("PARTYLINE_SERVER_URL", DEFAULT_SERVER_URL);
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidUrl("PARTYLINE_SERVER_URL".to_string(), e.to_string()))?;

        Ok(Self {
            base_url,
            timeout_secs: parse_env("PARTYLINE_TIMEOUT", 10)?,
            connect_timeout_secs: parse_env("PARTYLINE_CONNECT_TIMEOUT", 5)?,
            auth_token: std::env::var("PARTYLINE_AUTH_TOKEN")
                .ok()
                .filter(|token| !token.is_empty()),
            user_agent: format!("Partyline/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Create a configuration with a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            base_url: url.into(),
            ..Self::default()
        }
    }

    /// Attach a bearer token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Get the full URL for an API path such as `/api/listen/sync`
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVER_URL.to_string(),
            timeout_secs: 10,
            connect_timeout_secs: 5,
            auth_token: None,
            user_agent: format!("Partyline/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

//! Room channel (WebSocket) configuration

use url::Url;

use crate::{ConfigError, ConfigResult};

/// Path of the room socket on the party server
const SOCKET_PATH: &str = "/socket";

/// Room channel configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// WebSocket URL of the room channel (ws:// or wss://)
    pub url: String,
}

impl ChannelConfig {
    /// Load channel configuration from environment variables
    ///
    /// Uses `PARTYLINE_SOCKET_URL` when set, otherwise derives the socket URL
    /// from the server URL.
    pub fn from_env(server_url: &str) -> ConfigResult<Self> {
        match std::env::var("PARTYLINE_SOCKET_URL") {
            Ok(url) if !url.is_empty() => {
                Url::parse(&url).map_err(|e| {
                    ConfigError::InvalidUrl("PARTYLINE_SOCKET_URL".to_string(), e.to_string())
                })?;
                Ok(Self { url })
            }
            _ => Self::derive_from_server(server_url),
        }
    }

    /// Derive the socket URL from the HTTP server URL
    ///
    /// `http` becomes `ws`, `https` becomes `wss`, and the path is replaced
    /// with the socket path.
    pub fn derive_from_server(server_url: &str) -> ConfigResult<Self> {
        let mut url = Url::parse(server_url)
            .map_err(|e| ConfigError::InvalidUrl(server_url.to_string(), e.to_string()))?;

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme).map_err(|_| {
            ConfigError::InvalidUrl(server_url.to_string(), "cannot change scheme".to_string())
        })?;
        url.set_path(SOCKET_PATH);
        url.set_query(None);

        Ok(Self {
            url: url.to_string(),
        })
    }
}

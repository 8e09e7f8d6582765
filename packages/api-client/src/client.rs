//! Party server API client implementation

use std::fmt;
use std::time::Duration;

use partyline_shared_config::ServerConfig;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{
    BroadcastStarted, DeviceRequest, ErrorResponse, ListeningStarted, StartBroadcastRequest,
    StartListeningRequest, SyncSnapshot, TokenResponse, Track, Transferred,
};

/// Maximum error body size kept in `ApiError::Status`
const MAX_ERROR_BODY_SIZE: usize = 1000;

/// Maximum room name length
const MAX_ROOM_NAME_LENGTH: usize = 128;

const BROADCAST_START_PATH: &str = "/api/broadcast/start";
const BROADCAST_STOP_PATH: &str = "/api/broadcast/stop";
const BROADCAST_CHANGE_PATH: &str = "/api/broadcast/change";
const BROADCAST_PAUSE_PATH: &str = "/api/broadcast/pause";
const LISTEN_START_PATH: &str = "/api/listen/start";
const LISTEN_STOP_PATH: &str = "/api/listen/stop";
const LISTEN_SYNC_PATH: &str = "/api/listen/sync";
const TRANSFER_PATH: &str = "/api/transfer";
const TOKEN_PATH: &str = "/api/token";
const STOP_BEACON_PATH: &str = "/api/stop";

/// Party server API client
///
/// One method per server operation. Every call is a single attempt: retrying
/// is the caller's decision.
#[derive(Clone)]
pub struct PartyApiClient {
    http_client: Client,
    config: ServerConfig,
}

impl fmt::Debug for PartyApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartyApiClient")
            .field("base_url", &self.config.base_url)
            .field(
                "auth_token",
                &self.config.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl PartyApiClient {
    /// Create a new client from configuration
    pub fn new(config: &ServerConfig) -> ApiResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http_client,
            config: config.clone(),
        })
    }

    /// Create a client with a custom HTTP client (for testing)
    pub fn with_client(config: &ServerConfig, http_client: Client) -> Self {
        Self {
            http_client,
            config: config.clone(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn validate_device_id(device_id: &str) -> ApiResult<&str> {
        let trimmed = device_id.trim();
        if trimmed.is_empty() {
            return Err(ApiError::InvalidInput(
                "device id cannot be empty".to_string(),
            ));
        }
        Ok(trimmed)
    }

    fn validate_room(room: &str) -> ApiResult<&str> {
        let trimmed = room.trim();
        if trimmed.is_empty() {
            return Err(ApiError::InvalidInput(
                "room name cannot be empty".to_string(),
            ));
        }
        if trimmed.len() > MAX_ROOM_NAME_LENGTH {
            return Err(ApiError::InvalidInput(format!(
                "room name too long (max {} characters)",
                MAX_ROOM_NAME_LENGTH
            )));
        }
        Ok(trimmed)
    }

    /// Truncate error body, respecting UTF-8 boundaries
    fn truncate_error_body(body: String) -> String {
        if body.len() <= MAX_ERROR_BODY_SIZE {
            return body;
        }

        let truncate_at = body
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= MAX_ERROR_BODY_SIZE)
            .last()
            .unwrap_or(0);

        format!("{}... (truncated)", &body[..truncate_at])
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// POST to an API path and return the body text of a successful response
    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> ApiResult<String> {
        let mut request = self.authorize(self.http_client.post(self.config.endpoint(path)));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Http(e)
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(path, "Party server rate limited");
            return Err(ApiError::RateLimited);
        }

        if !status.is_success() {
            let body = Self::truncate_error_body(response.text().await.unwrap_or_default());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.text().await.map_err(ApiError::Http)
    }

    /// Detect the `{"error": "..."}` payload the server sends with a 200
    fn parse_api_error(text: &str) -> Option<ApiError> {
        serde_json::from_str::<ErrorResponse>(text)
            .ok()
            .map(|e| ApiError::Server(e.error))
    }

    fn parse_response<T: DeserializeOwned>(text: &str) -> ApiResult<T> {
        if let Some(error) = Self::parse_api_error(text) {
            return Err(error);
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Acks carry no payload; anything but an error object counts as success
    fn parse_ack(text: &str) -> ApiResult<()> {
        match Self::parse_api_error(text) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Start broadcasting from a device into a room
    ///
    /// # Errors
    /// - `ApiError::InvalidInput` - If the device id or room name is empty
    /// - `ApiError::Server` - If the server refuses (e.g. the device is offline)
    /// - `ApiError::Http` / `ApiError::Timeout` - If the request fails
    #[instrument(skip(self))]
    pub async fn start_broadcast(
        &self,
        device_id: &str,
        room_name: &str,
    ) -> ApiResult<BroadcastStarted> {
        let device_id = Self::validate_device_id(device_id)?;
        let room_name = Self::validate_room(room_name)?;

        let text = self
            .post(
                BROADCAST_START_PATH,
                Some(&StartBroadcastRequest {
                    device_id,
                    room_name,
                }),
            )
            .await?;
        let started: BroadcastStarted = Self::parse_response(&text)?;

        debug!(
            room_id = %started.room_id,
            listeners = started.listener_count,
            playing = started.now_playing.is_some(),
            "Broadcast started"
        );

        Ok(started)
    }

    /// Stop broadcasting and close the room
    #[instrument(skip(self))]
    pub async fn stop_broadcast(&self, device_id: &str) -> ApiResult<()> {
        let device_id = Self::validate_device_id(device_id)?;
        let text = self
            .post(BROADCAST_STOP_PATH, Some(&DeviceRequest { device_id }))
            .await?;
        Self::parse_ack(&text)
    }

    /// Tell the room the broadcaster changed (or resumed) the track
    #[instrument(skip(self, track), fields(uri = %track.uri, position_ms = ?track.position_ms))]
    pub async fn change_track(&self, track: &Track) -> ApiResult<()> {
        if track.uri.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "track uri cannot be empty".to_string(),
            ));
        }
        let text = self.post(BROADCAST_CHANGE_PATH, Some(track)).await?;
        Self::parse_ack(&text)
    }

    /// Tell the room the broadcaster paused
    #[instrument(skip(self))]
    pub async fn pause_broadcast(&self) -> ApiResult<()> {
        let text = self.post::<()>(BROADCAST_PAUSE_PATH, None).await?;
        Self::parse_ack(&text)
    }

    /// Join a room as a listener
    #[instrument(skip(self))]
    pub async fn start_listening(
        &self,
        device_id: &str,
        room_id: &str,
    ) -> ApiResult<ListeningStarted> {
        let device_id = Self::validate_device_id(device_id)?;
        let room_id = Self::validate_room(room_id)?;

        let text = self
            .post(
                LISTEN_START_PATH,
                Some(&StartListeningRequest { device_id, room_id }),
            )
            .await?;
        let started: ListeningStarted = Self::parse_response(&text)?;

        debug!(
            room_id,
            listeners = started.listener_count,
            "Listening started"
        );

        Ok(started)
    }

    /// Leave the room as a listener
    #[instrument(skip(self))]
    pub async fn stop_listening(&self, device_id: &str) -> ApiResult<()> {
        let device_id = Self::validate_device_id(device_id)?;
        let text = self
            .post(LISTEN_STOP_PATH, Some(&DeviceRequest { device_id }))
            .await?;
        Self::parse_ack(&text)
    }

    /// Fetch the authoritative playback snapshot for the listener's room
    #[instrument(skip(self))]
    pub async fn sync(&self, device_id: &str) -> ApiResult<SyncSnapshot> {
        let device_id = Self::validate_device_id(device_id)?;
        let text = self
            .post(LISTEN_SYNC_PATH, Some(&DeviceRequest { device_id }))
            .await?;
        Self::parse_response(&text)
    }

    /// Move playback back onto the given device
    #[instrument(skip(self))]
    pub async fn transfer(&self, device_id: &str) -> ApiResult<Transferred> {
        let device_id = Self::validate_device_id(device_id)?;
        let text = self
            .post(TRANSFER_PATH, Some(&DeviceRequest { device_id }))
            .await?;
        Self::parse_response(&text)
    }

    /// Fetch the access token the playback device authenticates with
    #[instrument(skip(self))]
    pub async fn fetch_token(&self) -> ApiResult<String> {
        let text = self.post::<()>(TOKEN_PATH, None).await?;
        let response: TokenResponse = Self::parse_response(&text)?;
        Ok(response.token)
    }

    /// Best-effort "stop whatever I'm doing" sent when the session unloads
    ///
    /// The response body is plain text and is ignored.
    pub async fn send_stop_beacon(&self) -> ApiResult<()> {
        self.post::<()>(STOP_BEACON_PATH, None).await.map(|_| ())
    }
}

//! Party server request and response models

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize};

/// A track as reported by the playback provider
///
/// Identity is the `uri`: two tracks with the same uri are the same track,
/// whatever their position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Provider URI (e.g., `spotify:track:4uLU6hMCjMI75M1A2tKUQC`)
    pub uri: String,

    /// Provider ID
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,

    /// Item type (e.g., "track", "episode")
    #[serde(rename = "type", default, deserialize_with = "null_as_empty")]
    pub kind: String,

    /// Human-readable title
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,

    /// Playback offset in milliseconds (only when seeking)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_ms: Option<u64>,
}

impl Track {
    /// Create a track with no position
    pub fn new(
        uri: impl Into<String>,
        id: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            id: id.into(),
            kind: kind.into(),
            name: name.into(),
            position_ms: None,
        }
    }

    /// Same track, starting at the given position
    pub fn at_position(mut self, position_ms: u64) -> Self {
        self.position_ms = Some(position_ms);
        self
    }

    /// Same track, with no position
    pub fn without_position(mut self) -> Self {
        self.position_ms = None;
        self
    }

    /// Public link to the item on the provider's web player
    pub fn open_url(&self) -> String {
        format!("https://open.spotify.com/{}/{}", self.kind, self.id)
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response of a successful broadcast start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastStarted {
    /// Room identifier assigned by the server
    pub room_id: String,

    /// Shareable link listeners open to join
    pub stream_url: String,

    /// Track already playing on the broadcaster's account
    #[serde(rename = "playing", default)]
    pub now_playing: Option<Track>,

    /// Listeners already in the room
    #[serde(rename = "number", default)]
    pub listener_count: u32,
}

/// Response of a successful listen start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListeningStarted {
    /// Listeners in the room, including this one
    #[serde(rename = "number", default)]
    pub listener_count: u32,

    /// What the broadcaster is playing right now
    #[serde(rename = "playing", default)]
    pub now_playing: Option<Track>,
}

/// Authoritative playback snapshot returned by sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSnapshot {
    /// Listeners in the room (when reported)
    #[serde(rename = "number", default)]
    pub listener_count: Option<u32>,

    /// What the broadcaster is playing right now
    #[serde(rename = "playing", default)]
    pub now_playing: Option<Track>,
}

/// Response of a successful device transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transferred {
    /// What is playing on the reclaimed device
    #[serde(rename = "playing", default)]
    pub now_playing: Option<Track>,
}

// Request bodies

#[derive(Debug, Serialize)]
pub(crate) struct StartBroadcastRequest<'a> {
    pub device_id: &'a str,
    pub room_name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct StartListeningRequest<'a> {
    pub device_id: &'a str,
    pub room_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeviceRequest<'a> {
    pub device_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: String,
}

/// Error payload the server returns with a 200 status
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

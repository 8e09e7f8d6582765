//! Controller inputs and outputs
//!
//! The controller consumes [`SessionEvent`]s and answers with [`Command`]s.
//! Server calls are described by [`Operation`] values so that a failed call
//! can be re-issued verbatim from its retry action.

use partyline_api_client::{
    ApiError, BroadcastStarted, ListeningStarted, SyncSnapshot, Track, Transferred,
};
use serde::Serialize;

use crate::channel::RoomEvent;
use crate::device::DeviceEvent;

/// A server call with all of its arguments
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    StartBroadcast { device_id: String, room_name: String },
    StopBroadcast { device_id: String },
    StartListening { device_id: String, room_id: String },
    StopListening { device_id: String },
    ChangeTrack { track: Track },
    PauseBroadcast,
    Sync { device_id: String },
    Transfer { device_id: String },
}

impl Operation {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartBroadcast { .. } => "start_broadcast",
            Self::StopBroadcast { .. } => "stop_broadcast",
            Self::StartListening { .. } => "start_listening",
            Self::StopListening { .. } => "stop_listening",
            Self::ChangeTrack { .. } => "change_track",
            Self::PauseBroadcast => "pause_broadcast",
            Self::Sync { .. } => "sync",
            Self::Transfer { .. } => "transfer",
        }
    }

    /// Phrase used in the surfaced failure message
    pub(crate) fn failure_phrase(&self) -> &'static str {
        match self {
            Self::StartBroadcast { .. } => "start broadcast",
            Self::StopBroadcast { .. } => "stop broadcast",
            Self::StartListening { .. } => "start listening",
            Self::StopListening { .. } => "stop listening",
            Self::ChangeTrack { .. } => "change the track",
            Self::PauseBroadcast => "pause the broadcast",
            Self::Sync { .. } => "sync playback",
            Self::Transfer { .. } => "transfer playback",
        }
    }

    /// Whether the session waits in `Loading` for this call
    pub(crate) fn is_blocking(&self) -> bool {
        !matches!(self, Self::ChangeTrack { .. } | Self::PauseBroadcast)
    }
}

/// Successful result of an [`Operation`]
#[derive(Debug, Clone)]
pub enum Response {
    BroadcastStarted(BroadcastStarted),
    ListeningStarted(ListeningStarted),
    Synced(SyncSnapshot),
    Transferred(Transferred),
    /// Plain acknowledgement
    Ack,
}

/// Requests coming from the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Start broadcasting or listening
    Start,
    /// Stop broadcasting or listening
    Stop,
    /// Listener only: fetch the authoritative now-playing
    Sync,
    /// Invoke the retry action of the current error
    Retry,
    /// Broadcaster only: pick another room name before starting
    RenameRoom(String),
}

/// Everything the controller reacts to
#[derive(Debug)]
pub enum SessionEvent {
    Device(DeviceEvent),
    Room(RoomEvent),
    User(UserCommand),
    ApiResponse {
        operation: Operation,
        result: Result<Response, ApiError>,
    },
}

impl From<DeviceEvent> for SessionEvent {
    fn from(event: DeviceEvent) -> Self {
        Self::Device(event)
    }
}

impl From<RoomEvent> for SessionEvent {
    fn from(event: RoomEvent) -> Self {
        Self::Room(event)
    }
}

impl From<UserCommand> for SessionEvent {
    fn from(command: UserCommand) -> Self {
        Self::User(command)
    }
}

/// Side effects requested by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Issue a server call and feed its result back as an event
    Call(Operation),
    JoinRoom(String),
    LeaveRoom(String),
    PauseDevice,
    ConnectDevice,
}

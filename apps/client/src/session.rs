//! Session state as seen by the presentation layer
//!
//! A [`Session`] is only ever mutated by the
//! [`SyncController`](crate::controller::SyncController); everything else
//! reads snapshots of it.

use std::fmt;

use partyline_api_client::Track;
use serde::Serialize;

use crate::operation::Operation;

/// Which side of the room this client is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Broadcaster,
    Listener,
}

impl Role {
    pub fn is_listener(&self) -> bool {
        matches!(self, Self::Listener)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broadcaster => write!(f, "broadcaster"),
            Self::Listener => write!(f, "listener"),
        }
    }
}

/// Session status
///
/// Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Waiting on the device or on a server call
    Loading,
    /// Device ready, not in a room
    Ready,
    /// In a room
    Streaming,
    /// Something failed; see [`Session::last_error`]
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Ready => write!(f, "ready"),
            Self::Streaming => write!(f, "streaming"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// What invoking an error's retry affordance does
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "operation", rename_all = "snake_case")]
pub enum RetryAction {
    /// Re-issue the identical server operation
    Api(Operation),
    /// Reconnect the local playback device
    ReconnectDevice,
}

/// A surfaced error
///
/// Recoverable errors carry a retry action; unrecoverable ones don't.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub message: String,
    pub retry: Option<RetryAction>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryAction) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn is_recoverable(&self) -> bool {
        self.retry.is_some()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The client's view of its participation in a room
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub(crate) role: Role,
    pub(crate) status: Status,
    pub(crate) room_id: String,
    pub(crate) device_id: Option<String>,
    pub(crate) is_paused: bool,
    pub(crate) current_track: Option<Track>,
    pub(crate) listener_count: u32,
    pub(crate) stream_url: Option<String>,
    pub(crate) last_error: Option<ErrorInfo>,
}

impl Session {
    /// A fresh session, waiting for the playback device
    ///
    /// `room_id` is the room to join for a listener, or the requested room
    /// name for a broadcaster.
    pub fn new(role: Role, room_id: impl Into<String>) -> Self {
        Self {
            role,
            status: Status::Loading,
            room_id: room_id.into(),
            device_id: None,
            is_paused: true,
            current_track: None,
            listener_count: 0,
            stream_url: None,
            last_error: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Only ever `Some` while streaming
    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub fn listener_count(&self) -> u32 {
        self.listener_count
    }

    pub fn stream_url(&self) -> Option<&str> {
        self.stream_url.as_deref()
    }

    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    /// Role-specific status line for the current status
    pub fn status_text(&self) -> Option<&'static str> {
        status_text(self.role, self.status)
    }

    /// Change status, keeping the track only while streaming
    pub(crate) fn set_status(&mut self, status: Status) {
        self.status = status;
        if status != Status::Streaming {
            self.current_track = None;
        }
        if status != Status::Error {
            self.last_error = None;
        }
    }

    pub(crate) fn fail(&mut self, error: ErrorInfo) {
        self.set_status(Status::Error);
        self.last_error = Some(error);
    }

    /// Back to the pre-stream default
    pub(crate) fn reset_to_ready(&mut self) {
        self.set_status(Status::Ready);
        self.is_paused = true;
        self.listener_count = 0;
        self.stream_url = None;
    }
}

/// Status line shown under the player
///
/// Errors have no status line; the error message is shown instead.
pub fn status_text(role: Role, status: Status) -> Option<&'static str> {
    let text = match (role, status) {
        (_, Status::Error) => return None,
        (_, Status::Loading) => "Negotiating with servers...",
        (Role::Listener, Status::Ready) => "Click on \"Start listening\"...",
        (Role::Listener, Status::Streaming) => "Sit back and enjoy the tunes!",
        (Role::Broadcaster, Status::Ready) => "Click on \"Start broadcast\"...",
        (Role::Broadcaster, Status::Streaming) => {
            "Play music in your player and share the link with your friends!"
        }
    };
    Some(text)
}

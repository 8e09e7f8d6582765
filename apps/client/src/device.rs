//! Playback device adapter
//!
//! The local playback device is an external capability. It is reached through
//! the narrow [`PlaybackDevice`] trait for commands, and reports back through
//! a [`DeviceEventSender`] it receives when the adapter is built.

use partyline_api_client::Track;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Playback device errors
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The device has not connected yet
    #[error("Playback device is not connected")]
    NotConnected,

    /// The device refused a command
    #[error("Playback device rejected the command: {0}")]
    Rejected(String),

    /// Nobody is listening for device events anymore
    #[error("Playback device event channel closed")]
    Closed,
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Capability failures the device can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    Initialization,
    Authentication,
    Account,
    Playback,
}

impl DeviceErrorKind {
    /// Message surfaced to the user for this failure
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Initialization => {
                "The playback device couldn't be initialized. \
                 Try restarting or using a different device."
            }
            Self::Authentication => "There has been an issue with the playback credentials.",
            Self::Account => {
                "This page does not work for users without a Premium account. \
                 This is a limitation of the playback provider and we are very sorry!"
            }
            Self::Playback => "Something went wrong with playback.",
        }
    }
}

/// What the device reports about its own playback
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub paused: bool,
    pub position_ms: u64,
    pub track: Track,
}

/// Events emitted by the playback device
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// The device registered with the provider
    Ready { device_id: String },

    /// The device went offline
    NotReady { device_id: String },

    /// Playback state changed; `None` means the device lost playback
    StateChanged(Option<PlaybackSnapshot>),

    /// A capability error
    Error {
        kind: DeviceErrorKind,
        message: String,
    },
}

/// Commands the session needs from a playback device
pub trait PlaybackDevice: Send {
    /// Register the device with the playback provider
    ///
    /// Readiness is reported asynchronously through the event sender.
    fn connect(&mut self) -> DeviceResult<()>;

    /// Pause local playback
    fn pause(&mut self) -> DeviceResult<()>;
}

/// Handle a device uses to report events
#[derive(Debug, Clone)]
pub struct DeviceEventSender {
    tx: mpsc::UnboundedSender<DeviceEvent>,
}

impl DeviceEventSender {
    pub fn send(&self, event: DeviceEvent) -> DeviceResult<()> {
        self.tx.send(event).map_err(|_| DeviceError::Closed)
    }

    pub fn ready(&self, device_id: impl Into<String>) -> DeviceResult<()> {
        self.send(DeviceEvent::Ready {
            device_id: device_id.into(),
        })
    }

    pub fn not_ready(&self, device_id: impl Into<String>) -> DeviceResult<()> {
        self.send(DeviceEvent::NotReady {
            device_id: device_id.into(),
        })
    }

    pub fn state_changed(&self, snapshot: Option<PlaybackSnapshot>) -> DeviceResult<()> {
        self.send(DeviceEvent::StateChanged(snapshot))
    }

    pub fn error(&self, kind: DeviceErrorKind, message: impl Into<String>) -> DeviceResult<()> {
        self.send(DeviceEvent::Error {
            kind,
            message: message.into(),
        })
    }
}

/// Owns one playback device and the stream of its events
pub struct PlaybackDeviceAdapter {
    device: Box<dyn PlaybackDevice>,
    events: mpsc::UnboundedReceiver<DeviceEvent>,
}

impl std::fmt::Debug for PlaybackDeviceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackDeviceAdapter").finish_non_exhaustive()
    }
}

impl PlaybackDeviceAdapter {
    /// Build the device, handing it the sender for its events
    pub fn new<D, F>(build: F) -> Self
    where
        D: PlaybackDevice + 'static,
        F: FnOnce(DeviceEventSender) -> D,
    {
        Self::with_controls(|events| (build(events), ())).0
    }

    /// Like [`new`](Self::new), for devices that hand back a control handle
    pub fn with_controls<D, C, F>(build: F) -> (Self, C)
    where
        D: PlaybackDevice + 'static,
        F: FnOnce(DeviceEventSender) -> (D, C),
    {
        let (tx, events) = mpsc::unbounded_channel();
        let (device, controls) = build(DeviceEventSender { tx });
        let adapter = Self {
            device: Box::new(device),
            events,
        };
        (adapter, controls)
    }

    pub fn connect(&mut self) -> DeviceResult<()> {
        debug!("Connecting playback device");
        self.device.connect()
    }

    pub fn pause(&mut self) -> DeviceResult<()> {
        self.device.pause().map_err(|e| {
            warn!(error = %e, "Failed to pause playback device");
            e
        })
    }

    /// Next device event, or `None` once the device dropped its sender
    pub async fn next_event(&mut self) -> Option<DeviceEvent> {
        self.events.recv().await
    }
}

//! Console front end
//!
//! A [`ConsoleDevice`] stands in for a real playback device: playback is
//! driven by lines typed on stdin, and each change is reported to the session
//! the way a device SDK would.

use std::sync::{Arc, Mutex, MutexGuard};

use partyline_api_client::Track;
use thiserror::Error;
use tracing::debug;

use crate::device::{
    DeviceError, DeviceErrorKind, DeviceEventSender, DeviceResult, PlaybackDevice,
    PlaybackDeviceAdapter, PlaybackSnapshot,
};
use crate::operation::UserCommand;

pub const HELP: &str = "\
session: start | stop | sync | retry | rename NAME | quit
device:  play URI [POSITION_MS] | pause | lost";

#[derive(Debug, Default)]
struct PlayerState {
    connected: bool,
    playback: Option<PlaybackSnapshot>,
}

/// Playback device backed by console input
pub struct ConsoleDevice {
    device_id: String,
    events: DeviceEventSender,
    state: Arc<Mutex<PlayerState>>,
}

/// Console-side controls of a [`ConsoleDevice`]
#[derive(Clone)]
pub struct ConsolePlayer {
    events: DeviceEventSender,
    state: Arc<Mutex<PlayerState>>,
}

fn lock(state: &Mutex<PlayerState>) -> MutexGuard<'_, PlayerState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ConsoleDevice {
    /// Build an adapter around a console device and return its controls
    pub fn adapter(device_id: impl Into<String>) -> (PlaybackDeviceAdapter, ConsolePlayer) {
        let device_id = device_id.into();
        let state = Arc::new(Mutex::new(PlayerState::default()));

        PlaybackDeviceAdapter::with_controls(|events| {
            let player = ConsolePlayer {
                events: events.clone(),
                state: state.clone(),
            };
            let device = ConsoleDevice {
                device_id,
                events,
                state,
            };
            (device, player)
        })
    }
}

impl PlaybackDevice for ConsoleDevice {
    fn connect(&mut self) -> DeviceResult<()> {
        lock(&self.state).connected = true;
        self.events.ready(self.device_id.clone())
    }

    fn pause(&mut self) -> DeviceResult<()> {
        let snapshot = {
            let mut state = lock(&self.state);
            if !state.connected {
                return Err(DeviceError::NotConnected);
            }
            match state.playback.as_mut() {
                Some(playback) if !playback.paused => {
                    playback.paused = true;
                    playback.clone()
                }
                _ => return Ok(()),
            }
        };
        self.events.state_changed(Some(snapshot))
    }
}

impl ConsolePlayer {
    /// Start playing a track at a position
    pub fn play(&self, track: Track, position_ms: u64) -> DeviceResult<()> {
        let snapshot = PlaybackSnapshot {
            paused: false,
            position_ms,
            track,
        };
        self.report(Some(snapshot))
    }

    /// Pause whatever is playing
    pub fn pause(&self) -> DeviceResult<()> {
        let snapshot = {
            let state = lock(&self.state);
            match &state.playback {
                Some(playback) => PlaybackSnapshot {
                    paused: true,
                    ..playback.clone()
                },
                None => return Ok(()),
            }
        };
        self.report(Some(snapshot))
    }

    /// Simulate the provider moving playback to another device
    pub fn lose(&self) -> DeviceResult<()> {
        self.report(None)
    }

    /// Report a capability error
    pub fn report_error(&self, kind: DeviceErrorKind, message: impl Into<String>) -> DeviceResult<()> {
        self.events.error(kind, message)
    }

    fn report(&self, snapshot: Option<PlaybackSnapshot>) -> DeviceResult<()> {
        {
            let mut state = lock(&self.state);
            if !state.connected {
                return Err(DeviceError::NotConnected);
            }
            state.playback = snapshot.clone();
        }
        debug!(?snapshot, "Console playback changed");
        self.events.state_changed(snapshot)
    }
}

/// Build a track from a provider uri such as `spotify:track:4uLU6hMC`
pub fn track_from_uri(uri: &str) -> Track {
    let mut parts = uri.rsplitn(3, ':');
    let id = parts.next().unwrap_or(uri);
    let kind = parts.next().unwrap_or("track");
    Track::new(uri, id, kind, id)
}

/// A parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Session(UserCommand),
    Play { track: Track, position_ms: u64 },
    Pause,
    Lost,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("Unknown command '{0}' (type 'help')")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Parse one console line; blank lines are `Ok(None)`
pub fn parse_input(line: &str) -> Result<Option<ConsoleInput>, InputError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };

    let input = match command.to_lowercase().as_str() {
        "start" => ConsoleInput::Session(UserCommand::Start),
        "stop" => ConsoleInput::Session(UserCommand::Stop),
        "sync" => ConsoleInput::Session(UserCommand::Sync),
        "retry" => ConsoleInput::Session(UserCommand::Retry),
        "rename" => {
            let name = words.collect::<Vec<_>>().join("-");
            if name.is_empty() {
                return Err(InputError::Usage("rename NAME"));
            }
            ConsoleInput::Session(UserCommand::RenameRoom(name))
        }
        "play" => {
            let uri = words.next().ok_or(InputError::Usage("play URI [POSITION_MS]"))?;
            let position_ms = match words.next() {
                Some(position) => position
                    .parse()
                    .map_err(|_| InputError::Usage("play URI [POSITION_MS]"))?,
                None => 0,
            };
            ConsoleInput::Play {
                track: track_from_uri(uri),
                position_ms,
            }
        }
        "pause" => ConsoleInput::Pause,
        "lost" => ConsoleInput::Lost,
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" => ConsoleInput::Quit,
        other => return Err(InputError::Unknown(other.to_string())),
    };
    Ok(Some(input))
}

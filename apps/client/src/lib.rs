//! Partyline playback sync client
//!
//! A broadcaster's playback is mirrored onto every listener in a room. This
//! crate holds the client side:
//!
//! - [`SyncController`] - the session state machine (no IO)
//! - [`RoomChannel`] - room-scoped events over a WebSocket
//! - [`PlaybackDeviceAdapter`] - the local playback device
//! - [`SessionRuntime`] - runs the controller against the real collaborators
//!
//! # Example
//!
//! ```rust,no_run
//! use partyline::{ConsoleDevice, Role, RoomChannel, SessionRuntime, Status, SyncController};
//! use partyline_api_client::PartyApiClient;
//! use partyline_shared_config::ClientConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let api = PartyApiClient::new(&config.server)?;
//! let channel = RoomChannel::connect(&config.channel).await?;
//! let (device, _player) = ConsoleDevice::adapter("device-1");
//!
//! let controller = SyncController::new(Role::Listener, "funky-jazz");
//! let mut session = SessionRuntime::spawn(controller, api, channel, device);
//!
//! session.wait_for(|s| s.status() == Status::Ready).await?;
//! session.start()?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod console;
pub mod controller;
pub mod detector;
pub mod device;
mod error;
pub mod operation;
pub mod room_name;
pub mod runtime;
pub mod session;

pub use channel::{ChannelError, ChannelResult, RoomChannel, RoomChannelPeer, RoomEvent, RoomIntent};
pub use console::{ConsoleDevice, ConsolePlayer};
pub use controller::SyncController;
pub use device::{
    DeviceError, DeviceErrorKind, DeviceEvent, DeviceEventSender, DeviceResult, PlaybackDevice,
    PlaybackDeviceAdapter, PlaybackSnapshot,
};
pub use error::{ClientError, ClientResult};
pub use operation::{Command, Operation, Response, SessionEvent, UserCommand};
pub use runtime::{SessionHandle, SessionRuntime};
pub use session::{status_text, ErrorInfo, RetryAction, Role, Session, Status};

//! Session runtime
//!
//! Drives a [`SyncController`] on a tokio task. The runtime owns the API
//! client, the room channel and the playback device, turns controller
//! commands into IO, and feeds everything that comes back in as events. One
//! event is handled to completion before the next is looked at.

use std::collections::VecDeque;
use std::time::Duration;

use partyline_api_client::{ApiResult, PartyApiClient};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::channel::RoomChannel;
use crate::controller::SyncController;
use crate::device::{DeviceErrorKind, DeviceEvent, PlaybackDeviceAdapter};
use crate::error::{ClientError, ClientResult};
use crate::operation::{Command, Operation, Response, SessionEvent, UserCommand};
use crate::session::Session;

/// How long the detached unload beacon may stay in flight
const STOP_BEACON_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum Control {
    User(UserCommand),
    Unload,
}

/// Owns the session's collaborators and runs its event loop
pub struct SessionRuntime {
    controller: SyncController,
    api: PartyApiClient,
    channel: RoomChannel,
    device: PlaybackDeviceAdapter,
    controls: mpsc::UnboundedReceiver<Control>,
    state: watch::Sender<Session>,
    calls: JoinSet<(Operation, ApiResult<Response>)>,
}

impl SessionRuntime {
    /// Start the runtime on a new task
    pub fn spawn(
        controller: SyncController,
        api: PartyApiClient,
        channel: RoomChannel,
        device: PlaybackDeviceAdapter,
    ) -> SessionHandle {
        let (control_tx, controls) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(controller.session().clone());

        let runtime = Self {
            controller,
            api,
            channel,
            device,
            controls,
            state,
            calls: JoinSet::new(),
        };

        SessionHandle {
            controls: control_tx,
            state: state_rx,
            task: tokio::spawn(runtime.run()),
        }
    }

    async fn run(mut self) {
        info!(
            role = %self.controller.session().role(),
            room_id = %self.controller.session().room_id(),
            "Session started"
        );
        self.execute(vec![Command::ConnectDevice]);

        loop {
            tokio::select! {
                control = self.controls.recv() => match control {
                    Some(Control::User(command)) => self.dispatch(SessionEvent::User(command)),
                    Some(Control::Unload) | None => break,
                },
                Some(event) = self.device.next_event() => {
                    self.dispatch(SessionEvent::Device(event));
                }
                Some(event) = self.channel.next_event() => {
                    self.dispatch(SessionEvent::Room(event));
                }
                Some(joined) = self.calls.join_next() => match joined {
                    Ok((operation, result)) => {
                        self.dispatch(SessionEvent::ApiResponse { operation, result });
                    }
                    Err(e) => warn!(error = %e, "Server call task failed"),
                },
            }
        }

        self.unload();
    }

    fn dispatch(&mut self, event: SessionEvent) {
        let commands = self.controller.handle(event);
        self.execute(commands);
        self.state.send_replace(self.controller.session().clone());
    }

    fn execute(&mut self, commands: Vec<Command>) {
        let mut queue = VecDeque::from(commands);

        while let Some(command) = queue.pop_front() {
            match command {
                Command::Call(operation) => {
                    let api = self.api.clone();
                    self.calls.spawn(async move {
                        let result = perform(&api, &operation).await;
                        (operation, result)
                    });
                }
                Command::JoinRoom(room_id) => {
                    if let Err(e) = self.channel.join(room_id) {
                        warn!(error = %e, "Failed to join room");
                    }
                }
                Command::LeaveRoom(room_id) => {
                    if let Err(e) = self.channel.leave(room_id) {
                        warn!(error = %e, "Failed to leave room");
                    }
                }
                Command::PauseDevice => {
                    // Failure is already logged by the adapter
                    let _ = self.device.pause();
                }
                Command::ConnectDevice => {
                    if let Err(e) = self.device.connect() {
                        let event = DeviceEvent::Error {
                            kind: DeviceErrorKind::Initialization,
                            message: e.to_string(),
                        };
                        queue.extend(self.controller.handle(event.into()));
                    }
                }
            }
        }
    }

    fn unload(mut self) {
        info!("Unloading session");
        self.calls.abort_all();

        // Fire and forget; the session state is dropped right away
        let api = self.api;
        tokio::spawn(async move {
            match tokio::time::timeout(STOP_BEACON_TIMEOUT, api.send_stop_beacon()).await {
                Ok(Ok(())) => debug!("Stop beacon delivered"),
                Ok(Err(e)) => debug!(error = %e, "Stop beacon failed"),
                Err(_) => debug!("Stop beacon timed out"),
            }
        });
    }
}

/// Issue one server call and wrap its payload
async fn perform(api: &PartyApiClient, operation: &Operation) -> ApiResult<Response> {
    match operation {
        Operation::StartBroadcast {
            device_id,
            room_name,
        } => api
            .start_broadcast(device_id, room_name)
            .await
            .map(Response::BroadcastStarted),
        Operation::StopBroadcast { device_id } => {
            api.stop_broadcast(device_id).await.map(|_| Response::Ack)
        }
        Operation::StartListening { device_id, room_id } => api
            .start_listening(device_id, room_id)
            .await
            .map(Response::ListeningStarted),
        Operation::StopListening { device_id } => {
            api.stop_listening(device_id).await.map(|_| Response::Ack)
        }
        Operation::ChangeTrack { track } => api.change_track(track).await.map(|_| Response::Ack),
        Operation::PauseBroadcast => api.pause_broadcast().await.map(|_| Response::Ack),
        Operation::Sync { device_id } => api.sync(device_id).await.map(Response::Synced),
        Operation::Transfer { device_id } => {
            api.transfer(device_id).await.map(Response::Transferred)
        }
    }
}

/// Presentation-layer entry point to a running session
#[derive(Debug)]
pub struct SessionHandle {
    controls: mpsc::UnboundedSender<Control>,
    state: watch::Receiver<Session>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn send(&self, command: UserCommand) -> ClientResult<()> {
        self.controls
            .send(Control::User(command))
            .map_err(|_| ClientError::SessionClosed)
    }

    pub fn start(&self) -> ClientResult<()> {
        self.send(UserCommand::Start)
    }

    pub fn stop(&self) -> ClientResult<()> {
        self.send(UserCommand::Stop)
    }

    pub fn sync(&self) -> ClientResult<()> {
        self.send(UserCommand::Sync)
    }

    pub fn retry(&self) -> ClientResult<()> {
        self.send(UserCommand::Retry)
    }

    pub fn rename_room(&self, name: impl Into<String>) -> ClientResult<()> {
        self.send(UserCommand::RenameRoom(name.into()))
    }

    /// Latest session snapshot
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver notified on every session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.clone()
    }

    /// Wait until the session satisfies `predicate`
    pub async fn wait_for(&mut self, predicate: impl FnMut(&Session) -> bool) -> ClientResult<Session> {
        let session = self
            .state
            .wait_for(predicate)
            .await
            .map_err(|_| ClientError::SessionClosed)?;
        Ok(session.clone())
    }

    /// Stop the session: fire the stop beacon and discard all state
    ///
    /// Returns once the session is gone. The beacon is not awaited.
    pub async fn unload(self) -> ClientResult<()> {
        // The runtime may already be gone; the join below reports that
        let _ = self.controls.send(Control::Unload);
        self.task.await?;
        Ok(())
    }
}

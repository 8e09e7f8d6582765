//! Session state machine
//!
//! [`SyncController`] is the only writer of [`Session`]. It performs no IO:
//! each event is handled to completion and answered with the [`Command`]s the
//! runtime must carry out. Server responses come back later as
//! [`SessionEvent::ApiResponse`].
//!
//! ```text
//! Loading ──device ready──▶ Ready ──start──▶ Loading ──ok──▶ Streaming
//!    ▲                        ▲                  │             │
//!    │                        └──stop ok── Loading ◀──stop─────┤
//!    └────retry──── Error ◀──────── failure ────┴──────────────┘
//! ```

use partyline_api_client::ApiError;
use tracing::{debug, info, warn};

use crate::channel::RoomEvent;
use crate::detector::{detect_change, PlaybackChange};
use crate::device::{DeviceErrorKind, DeviceEvent, PlaybackSnapshot};
use crate::operation::{Command, Operation, Response, SessionEvent, UserCommand};
use crate::session::{ErrorInfo, RetryAction, Role, Session, Status};

const DEVICE_NOT_READY: &str = "Device is not ready.";
const DEVICE_DISCONNECTED: &str = "Your account got disconnected from this device.";

/// The client state machine
#[derive(Debug, Clone)]
pub struct SyncController {
    session: Session,
    /// Blocking call the session is waiting on in `Loading`
    awaiting: Option<Operation>,
}

impl SyncController {
    pub fn new(role: Role, room_id: impl Into<String>) -> Self {
        Self {
            session: Session::new(role, room_id),
            awaiting: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Apply one event and return the side effects it requires
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Command> {
        match event {
            SessionEvent::Device(event) => self.on_device(event),
            SessionEvent::Room(event) => self.on_room(event),
            SessionEvent::User(command) => self.on_user(command),
            SessionEvent::ApiResponse { operation, result } => self.on_response(operation, result),
        }
    }

    // =========================================================================
    // Device events
    // =========================================================================

    fn on_device(&mut self, event: DeviceEvent) -> Vec<Command> {
        match event {
            DeviceEvent::Ready { device_id } => {
                info!(%device_id, "Playback device ready");
                self.session.device_id = Some(device_id);
                if self.session.status == Status::Loading && self.awaiting.is_none() {
                    self.session.set_status(Status::Ready);
                }
                Vec::new()
            }
            DeviceEvent::NotReady { device_id } => {
                warn!(%device_id, "Playback device went offline");
                if self.session.status == Status::Ready {
                    self.session.device_id = None;
                }
                Vec::new()
            }
            DeviceEvent::StateChanged(snapshot) => self.on_playback(snapshot),
            DeviceEvent::Error { kind, message } => {
                warn!(?kind, %message, "Playback device error");
                let mut error = ErrorInfo::new(kind.user_message());
                match kind {
                    DeviceErrorKind::Initialization | DeviceErrorKind::Authentication => {
                        error = error.with_retry(RetryAction::ReconnectDevice);
                    }
                    DeviceErrorKind::Account => {}
                    DeviceErrorKind::Playback => {
                        if let (Role::Listener, Some(device_id)) =
                            (self.session.role, self.session.device_id.clone())
                        {
                            error = error.with_retry(RetryAction::Api(Operation::Sync { device_id }));
                        }
                    }
                }
                self.fail(error);
                Vec::new()
            }
        }
    }

    fn on_playback(&mut self, snapshot: Option<PlaybackSnapshot>) -> Vec<Command> {
        if self.session.role.is_listener() || self.session.status != Status::Streaming {
            debug!(status = %self.session.status, "Ignoring device playback state");
            return Vec::new();
        }

        let Some(snapshot) = snapshot else {
            warn!("Broadcast device lost playback");
            let mut error = ErrorInfo::new(DEVICE_DISCONNECTED);
            if let Some(device_id) = self.session.device_id.clone() {
                error = error.with_retry(RetryAction::Api(Operation::Transfer { device_id }));
            }
            self.session.is_paused = true;
            self.fail(error);
            return Vec::new();
        };

        match detect_change(
            self.session.is_paused,
            self.session.current_track.as_ref(),
            &snapshot,
        ) {
            PlaybackChange::Paused => {
                debug!("Broadcast paused");
                self.session.is_paused = true;
                vec![Command::Call(Operation::PauseBroadcast)]
            }
            PlaybackChange::Resumed(track) | PlaybackChange::Advanced(track) => {
                debug!(uri = %track.uri, position_ms = ?track.position_ms, "Broadcast track changed");
                self.session.is_paused = false;
                self.session.current_track = Some(track.clone().without_position());
                vec![Command::Call(Operation::ChangeTrack { track })]
            }
            PlaybackChange::Unchanged => Vec::new(),
        }
    }

    // =========================================================================
    // Room events
    // =========================================================================

    fn on_room(&mut self, event: RoomEvent) -> Vec<Command> {
        if self.session.status != Status::Streaming {
            debug!(?event, status = %self.session.status, "Ignoring room event");
            return Vec::new();
        }

        match event {
            RoomEvent::ListenerCountChanged { count } => {
                self.session.listener_count = count;
            }
            RoomEvent::NowPlayingChanged { count, track } => {
                self.session.listener_count = count;
                if self.session.role.is_listener() {
                    self.session.current_track = track;
                }
            }
            RoomEvent::RoomClosed => {
                info!(room_id = %self.session.room_id, "Room closed");
                self.awaiting = None;
                self.session.reset_to_ready();
            }
        }
        Vec::new()
    }

    // =========================================================================
    // User commands
    // =========================================================================

    fn on_user(&mut self, command: UserCommand) -> Vec<Command> {
        match command {
            UserCommand::Start => self.start(),
            UserCommand::Stop => self.stop(),
            UserCommand::Sync => {
                if !self.session.role.is_listener() || self.session.status != Status::Streaming {
                    debug!("Sync is only available to a streaming listener");
                    return Vec::new();
                }
                match self.session.device_id.clone() {
                    Some(device_id) => self.issue(Operation::Sync { device_id }),
                    None => self.device_not_ready(),
                }
            }
            UserCommand::Retry => self.retry(),
            UserCommand::RenameRoom(name) => {
                let name = name.trim();
                if self.session.role.is_listener()
                    || self.session.status == Status::Streaming
                    || self.awaiting.is_some()
                    || name.is_empty()
                {
                    debug!(room_name = name, "Room rename ignored");
                    return Vec::new();
                }
                info!(room_name = name, "Room renamed");
                self.session.room_id = name.to_string();
                Vec::new()
            }
        }
    }

    fn start(&mut self) -> Vec<Command> {
        if self.session.status != Status::Ready {
            debug!(status = %self.session.status, "Start ignored");
            return Vec::new();
        }
        let Some(device_id) = self.session.device_id.clone() else {
            return self.device_not_ready();
        };

        let room = self.session.room_id.clone();
        let operation = match self.session.role {
            Role::Broadcaster => Operation::StartBroadcast {
                device_id,
                room_name: room,
            },
            Role::Listener => Operation::StartListening {
                device_id,
                room_id: room,
            },
        };
        self.issue(operation)
    }

    fn stop(&mut self) -> Vec<Command> {
        if self.session.status != Status::Streaming {
            debug!(status = %self.session.status, "Stop ignored");
            return Vec::new();
        }
        let Some(device_id) = self.session.device_id.clone() else {
            return self.device_not_ready();
        };

        let operation = match self.session.role {
            Role::Broadcaster => Operation::StopBroadcast { device_id },
            Role::Listener => Operation::StopListening { device_id },
        };
        let mut commands = vec![Command::PauseDevice];
        commands.extend(self.issue(operation));
        commands
    }

    fn retry(&mut self) -> Vec<Command> {
        if self.session.status != Status::Error {
            return Vec::new();
        }
        let Some(retry) = self.session.last_error.as_ref().and_then(|e| e.retry.clone()) else {
            debug!("Current error has no retry action");
            return Vec::new();
        };

        info!(?retry, "Retrying");
        match retry {
            RetryAction::ReconnectDevice => {
                self.awaiting = None;
                self.session.set_status(Status::Loading);
                vec![Command::ConnectDevice]
            }
            RetryAction::Api(Operation::ChangeTrack { track }) => {
                self.session.set_status(Status::Streaming);
                self.session.current_track = Some(track.clone().without_position());
                vec![Command::Call(Operation::ChangeTrack { track })]
            }
            RetryAction::Api(operation) => self.issue(operation),
        }
    }

    // =========================================================================
    // Server responses
    // =========================================================================

    fn on_response(
        &mut self,
        operation: Operation,
        result: Result<Response, ApiError>,
    ) -> Vec<Command> {
        if operation.is_blocking() {
            if self.awaiting.as_ref() == Some(&operation) {
                self.awaiting = None;
            } else {
                warn!(
                    operation = operation.name(),
                    status = %self.session.status,
                    "Applying response for an operation the session is not waiting on"
                );
            }
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => return self.on_failure(operation, e),
        };

        match (operation, response) {
            (Operation::StartBroadcast { .. }, Response::BroadcastStarted(started)) => {
                info!(room_id = %started.room_id, "Broadcast started");
                self.session.set_status(Status::Streaming);
                self.session.room_id = started.room_id.clone();
                self.session.stream_url = Some(started.stream_url);
                self.session.listener_count = started.listener_count;
                self.session.current_track = started.now_playing;
                self.session.is_paused = true;
                vec![Command::JoinRoom(started.room_id)]
            }
            (Operation::StartListening { room_id, .. }, Response::ListeningStarted(started)) => {
                info!(%room_id, listeners = started.listener_count, "Listening started");
                self.session.set_status(Status::Streaming);
                self.session.listener_count = started.listener_count;
                self.session.current_track = started.now_playing;
                vec![Command::JoinRoom(room_id)]
            }
            (
                Operation::StopBroadcast { .. } | Operation::StopListening { .. },
                Response::Ack,
            ) => {
                let room_id = self.session.room_id.clone();
                info!(%room_id, "Stopped");
                self.session.reset_to_ready();
                vec![Command::LeaveRoom(room_id)]
            }
            (Operation::Sync { .. }, Response::Synced(snapshot)) => {
                debug!(playing = snapshot.now_playing.is_some(), "Synced");
                self.session.set_status(Status::Streaming);
                self.session.current_track = snapshot.now_playing;
                if let Some(count) = snapshot.listener_count {
                    self.session.listener_count = count;
                }
                Vec::new()
            }
            (Operation::Transfer { .. }, Response::Transferred(transferred)) => {
                info!("Playback transferred back to this device");
                self.session.set_status(Status::Streaming);
                self.session.current_track = transferred.now_playing;
                self.session.is_paused = true;
                Vec::new()
            }
            (Operation::ChangeTrack { .. } | Operation::PauseBroadcast, Response::Ack) => Vec::new(),
            (operation, response) => {
                warn!(operation = operation.name(), ?response, "Mismatched response");
                Vec::new()
            }
        }
    }

    fn on_failure(&mut self, operation: Operation, error: ApiError) -> Vec<Command> {
        warn!(
            operation = operation.name(),
            error = %error,
            retryable = error.is_retryable(),
            "Server call failed"
        );

        if operation == Operation::PauseBroadcast {
            return Vec::new();
        }
        if matches!(operation, Operation::ChangeTrack { .. })
            && self.session.status != Status::Streaming
        {
            debug!(status = %self.session.status, "Dropping track change failure outside a broadcast");
            return Vec::new();
        }

        let message = format!(
            "Failed to {} with message: {}.",
            operation.failure_phrase(),
            error
        );
        self.fail(ErrorInfo::new(message).with_retry(RetryAction::Api(operation)));
        Vec::new()
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Enter the waiting state for blocking calls, then issue the call
    fn issue(&mut self, operation: Operation) -> Vec<Command> {
        if operation.is_blocking() {
            self.session.set_status(Status::Loading);
            self.awaiting = Some(operation.clone());
        }
        debug!(operation = operation.name(), "Issuing server call");
        vec![Command::Call(operation)]
    }

    fn fail(&mut self, error: ErrorInfo) {
        warn!(message = %error.message, recoverable = error.is_recoverable(), "Session error");
        self.awaiting = None;
        self.session.fail(error);
    }

    fn device_not_ready(&mut self) -> Vec<Command> {
        self.fail(ErrorInfo::new(DEVICE_NOT_READY).with_retry(RetryAction::ReconnectDevice));
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use partyline_api_client::{
        BroadcastStarted, ListeningStarted, SyncSnapshot, Track, Transferred,
    };
    use rstest::rstest;

    const DEVICE: &str = "device-1";
    const ROOM: &str = "funky-jazz";

    fn track(uri: &str) -> Track {
        Track::new(uri, uri, "track", uri)
    }

    fn playing(paused: bool, uri: &str, position_ms: u64) -> SessionEvent {
        DeviceEvent::StateChanged(Some(PlaybackSnapshot {
            paused,
            position_ms,
            track: track(uri),
        }))
        .into()
    }

    fn respond(operation: Operation, result: Result<Response, ApiError>) -> SessionEvent {
        SessionEvent::ApiResponse { operation, result }
    }

    fn start_broadcast_op() -> Operation {
        Operation::StartBroadcast {
            device_id: DEVICE.to_string(),
            room_name: ROOM.to_string(),
        }
    }

    fn start_listening_op() -> Operation {
        Operation::StartListening {
            device_id: DEVICE.to_string(),
            room_id: ROOM.to_string(),
        }
    }

    fn ready(role: Role) -> SyncController {
        let mut controller = SyncController::new(role, ROOM);
        controller.handle(
            DeviceEvent::Ready {
                device_id: DEVICE.to_string(),
            }
            .into(),
        );
        controller
    }

    fn streaming_broadcaster() -> SyncController {
        let mut controller = ready(Role::Broadcaster);
        controller.handle(UserCommand::Start.into());
        controller.handle(respond(
            start_broadcast_op(),
            Ok(Response::BroadcastStarted(BroadcastStarted {
                room_id: ROOM.to_string(),
                stream_url: format!("http://party.test/listen/{}", ROOM),
                now_playing: None,
                listener_count: 0,
            })),
        ));
        controller
    }

    fn streaming_listener() -> SyncController {
        let mut controller = ready(Role::Listener);
        controller.handle(UserCommand::Start.into());
        controller.handle(respond(
            start_listening_op(),
            Ok(Response::ListeningStarted(ListeningStarted {
                listener_count: 2,
                now_playing: Some(track("A")),
            })),
        ));
        controller
    }

    fn server_error(message: &str) -> Result<Response, ApiError> {
        Err(ApiError::Server(message.to_string()))
    }

    // =========================================================================
    // Device readiness
    // =========================================================================

    #[test]
    fn test_device_ready_moves_loading_to_ready() {
        let controller = ready(Role::Broadcaster);
        assert_eq!(controller.session().status(), Status::Ready);
        assert_eq!(controller.session().device_id(), Some(DEVICE));
    }

    #[test]
    fn test_device_ready_does_not_interrupt_pending_call() {
        let mut controller = ready(Role::Broadcaster);
        controller.handle(UserCommand::Start.into());

        controller.handle(
            DeviceEvent::Ready {
                device_id: "device-2".to_string(),
            }
            .into(),
        );

        assert_eq!(controller.session().status(), Status::Loading);
        assert_eq!(controller.session().device_id(), Some("device-2"));
    }

    #[test]
    fn test_start_after_device_offline_reports_not_ready() {
        let mut controller = ready(Role::Broadcaster);
        controller.handle(
            DeviceEvent::NotReady {
                device_id: DEVICE.to_string(),
            }
            .into(),
        );

        let commands = controller.handle(UserCommand::Start.into());

        assert!(commands.is_empty());
        let session = controller.session();
        assert_eq!(session.status(), Status::Error);
        let error = session.last_error().unwrap();
        assert_eq!(error.message, "Device is not ready.");
        assert_eq!(error.retry, Some(RetryAction::ReconnectDevice));
    }

    #[test]
    fn test_reconnect_retry_returns_to_ready() {
        let mut controller = ready(Role::Broadcaster);
        controller.handle(
            DeviceEvent::NotReady {
                device_id: DEVICE.to_string(),
            }
            .into(),
        );
        controller.handle(UserCommand::Start.into());

        let commands = controller.handle(UserCommand::Retry.into());
        assert_eq!(commands, vec![Command::ConnectDevice]);
        assert_eq!(controller.session().status(), Status::Loading);

        controller.handle(
            DeviceEvent::Ready {
                device_id: DEVICE.to_string(),
            }
            .into(),
        );
        assert_eq!(controller.session().status(), Status::Ready);
    }

    // =========================================================================
    // Start / stop
    // =========================================================================

    #[test]
    fn test_start_broadcast_issues_call() {
        let mut controller = ready(Role::Broadcaster);

        let commands = controller.handle(UserCommand::Start.into());

        assert_eq!(commands, vec![Command::Call(start_broadcast_op())]);
        assert_eq!(controller.session().status(), Status::Loading);
    }

    #[test]
    fn test_start_broadcast_success_joins_server_room() {
        let mut controller = ready(Role::Broadcaster);
        controller.handle(UserCommand::Start.into());

        let commands = controller.handle(respond(
            start_broadcast_op(),
            Ok(Response::BroadcastStarted(BroadcastStarted {
                room_id: "funky-jazz-2".to_string(),
                stream_url: "http://party.test/listen/funky-jazz-2".to_string(),
                now_playing: Some(track("A")),
                listener_count: 1,
            })),
        ));

        assert_eq!(commands, vec![Command::JoinRoom("funky-jazz-2".to_string())]);
        let session = controller.session();
        assert_eq!(session.status(), Status::Streaming);
        assert_eq!(session.room_id(), "funky-jazz-2");
        assert_eq!(
            session.stream_url(),
            Some("http://party.test/listen/funky-jazz-2")
        );
        assert_eq!(session.current_track(), Some(&track("A")));
        assert_eq!(session.listener_count(), 1);
        assert!(session.is_paused());
    }

    #[test]
    fn test_start_broadcast_failure_retries_same_call() {
        let mut controller = ready(Role::Broadcaster);
        controller.handle(UserCommand::Start.into());

        controller.handle(respond(start_broadcast_op(), server_error("device offline")));

        let session = controller.session();
        assert_eq!(session.status(), Status::Error);
        let error = session.last_error().unwrap();
        assert!(error.message.contains("device offline"));
        assert_eq!(error.retry, Some(RetryAction::Api(start_broadcast_op())));

        let commands = controller.handle(UserCommand::Retry.into());
        assert_eq!(commands, vec![Command::Call(start_broadcast_op())]);
        assert_eq!(controller.session().status(), Status::Loading);
    }

    #[test]
    fn test_start_and_stop_ignored_while_loading_or_error() {
        let mut controller = SyncController::new(Role::Broadcaster, ROOM);
        assert!(controller.handle(UserCommand::Start.into()).is_empty());
        assert!(controller.handle(UserCommand::Stop.into()).is_empty());
        assert_eq!(controller.session().status(), Status::Loading);

        let mut controller = ready(Role::Broadcaster);
        controller.handle(UserCommand::Start.into());
        controller.handle(respond(start_broadcast_op(), server_error("nope")));
        assert!(controller.handle(UserCommand::Start.into()).is_empty());
        assert!(controller.handle(UserCommand::Stop.into()).is_empty());
        assert_eq!(controller.session().status(), Status::Error);
    }

    #[test]
    fn test_stop_pauses_device_first_then_resets() {
        let mut controller = streaming_broadcaster();
        controller.handle(playing(false, "A", 0));
        controller.handle(RoomEvent::ListenerCountChanged { count: 4 }.into());

        let commands = controller.handle(UserCommand::Stop.into());
        let stop = Operation::StopBroadcast {
            device_id: DEVICE.to_string(),
        };
        assert_eq!(commands, vec![Command::PauseDevice, Command::Call(stop.clone())]);
        assert_eq!(controller.session().status(), Status::Loading);
        assert!(controller.session().current_track().is_none());

        let commands = controller.handle(respond(stop, Ok(Response::Ack)));
        assert_eq!(commands, vec![Command::LeaveRoom(ROOM.to_string())]);
        let session = controller.session();
        assert_eq!(session.status(), Status::Ready);
        assert_eq!(session.listener_count(), 0);
        assert!(session.is_paused());
        assert!(session.stream_url().is_none());
    }

    #[test]
    fn test_stop_failure_offers_retry() {
        let mut controller = streaming_listener();
        controller.handle(UserCommand::Stop.into());
        let stop = Operation::StopListening {
            device_id: DEVICE.to_string(),
        };

        controller.handle(respond(stop.clone(), Err(ApiError::Timeout)));

        let error = controller.session().last_error().unwrap();
        assert!(error.message.starts_with("Failed to stop listening"));
        assert_eq!(error.retry, Some(RetryAction::Api(stop)));
    }

    // =========================================================================
    // Broadcaster change detection
    // =========================================================================

    #[test]
    fn test_device_events_ignored_unless_streaming() {
        let mut controller = ready(Role::Broadcaster);
        assert!(controller.handle(playing(false, "A", 0)).is_empty());
        assert!(controller.handle(playing(true, "A", 0)).is_empty());
        assert!(controller
            .handle(DeviceEvent::StateChanged(None).into())
            .is_empty());
        assert_eq!(controller.session().status(), Status::Ready);
    }

    #[test]
    fn test_device_events_ignored_while_stopping() {
        let mut controller = streaming_broadcaster();
        controller.handle(playing(false, "A", 0));
        controller.handle(UserCommand::Stop.into());
        assert_eq!(controller.session().status(), Status::Loading);

        assert!(controller.handle(playing(true, "A", 3_000)).is_empty());
        assert!(controller.handle(playing(false, "B", 0)).is_empty());
        assert!(controller
            .handle(DeviceEvent::StateChanged(None).into())
            .is_empty());

        let session = controller.session();
        assert_eq!(session.status(), Status::Loading);
        assert!(session.current_track().is_none());
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_device_events_ignored_in_error() {
        let mut controller = ready(Role::Broadcaster);
        controller.handle(UserCommand::Start.into());
        controller.handle(respond(start_broadcast_op(), server_error("nope")));
        assert_eq!(controller.session().status(), Status::Error);

        assert!(controller.handle(playing(false, "A", 0)).is_empty());
        assert!(controller.handle(playing(true, "A", 0)).is_empty());
        assert!(controller
            .handle(DeviceEvent::StateChanged(None).into())
            .is_empty());

        let session = controller.session();
        assert_eq!(session.status(), Status::Error);
        assert!(session.last_error().unwrap().message.contains("nope"));
        assert_eq!(
            session.last_error().unwrap().retry,
            Some(RetryAction::Api(start_broadcast_op()))
        );
    }

    #[test]
    fn test_listener_never_emits_track_changes() {
        let mut controller = streaming_listener();
        assert!(controller.handle(playing(false, "B", 0)).is_empty());
        assert!(controller.handle(playing(true, "B", 0)).is_empty());
        assert_eq!(controller.session().current_track(), Some(&track("A")));
    }

    #[test]
    fn test_first_play_after_start_announces_position() {
        let mut controller = streaming_broadcaster();

        let commands = controller.handle(playing(false, "A", 1_000));

        assert_eq!(commands.len(), 1);
        assert_matches!(
            &commands[0],
            Command::Call(Operation::ChangeTrack { track })
                if track.uri == "A" && track.position_ms == Some(1_000)
        );
        assert!(!controller.session().is_paused());
        assert_eq!(controller.session().current_track(), Some(&track("A")));
    }

    #[test]
    fn test_pause_notifies_once_without_track() {
        let mut controller = streaming_broadcaster();
        controller.handle(playing(false, "A", 0));

        let commands = controller.handle(playing(true, "A", 5_000));

        assert_eq!(commands, vec![Command::Call(Operation::PauseBroadcast)]);
        assert!(controller.session().is_paused());
    }

    #[test]
    fn test_resume_with_seek() {
        let mut controller = streaming_broadcaster();
        controller.handle(playing(false, "A", 0));
        controller.handle(playing(true, "A", 5_000));

        let commands = controller.handle(playing(false, "A", 42_000));

        assert_matches!(
            commands.as_slice(),
            [Command::Call(Operation::ChangeTrack { track })] if track.position_ms == Some(42_000)
        );
    }

    #[test]
    fn test_natural_advance_has_no_position() {
        let mut controller = streaming_broadcaster();
        controller.handle(playing(false, "A", 0));

        let commands = controller.handle(playing(false, "B", 3_000));

        assert_matches!(
            commands.as_slice(),
            [Command::Call(Operation::ChangeTrack { track })]
                if track.uri == "B" && track.position_ms.is_none()
        );
        assert_eq!(controller.session().current_track(), Some(&track("B")));
    }

    #[test]
    fn test_repeated_snapshots_are_idempotent() {
        let mut controller = streaming_broadcaster();
        controller.handle(playing(false, "A", 0));

        for position in [1_000, 2_000, 3_000] {
            assert!(controller.handle(playing(false, "A", position)).is_empty());
        }
        controller.handle(playing(true, "A", 4_000));
        assert!(controller.handle(playing(true, "A", 4_000)).is_empty());
    }

    #[test]
    fn test_device_lost_offers_transfer() {
        let mut controller = streaming_broadcaster();
        controller.handle(playing(false, "A", 0));

        controller.handle(DeviceEvent::StateChanged(None).into());

        let transfer = Operation::Transfer {
            device_id: DEVICE.to_string(),
        };
        let session = controller.session();
        assert_eq!(session.status(), Status::Error);
        assert!(session.current_track().is_none());
        assert_eq!(
            session.last_error().unwrap().retry,
            Some(RetryAction::Api(transfer.clone()))
        );

        let commands = controller.handle(UserCommand::Retry.into());
        assert_eq!(commands, vec![Command::Call(transfer.clone())]);

        controller.handle(respond(
            transfer,
            Ok(Response::Transferred(Transferred {
                now_playing: Some(track("A")),
            })),
        ));
        let session = controller.session();
        assert_eq!(session.status(), Status::Streaming);
        assert_eq!(session.current_track(), Some(&track("A")));
        assert!(session.is_paused());

        // The next unpaused snapshot re-announces with its position
        let commands = controller.handle(playing(false, "A", 9_000));
        assert_matches!(
            commands.as_slice(),
            [Command::Call(Operation::ChangeTrack { track })] if track.position_ms == Some(9_000)
        );
    }

    #[test]
    fn test_pause_failure_is_not_surfaced() {
        let mut controller = streaming_broadcaster();
        controller.handle(playing(false, "A", 0));
        controller.handle(playing(true, "A", 0));

        let commands = controller.handle(respond(Operation::PauseBroadcast, server_error("nope")));

        assert!(commands.is_empty());
        assert_eq!(controller.session().status(), Status::Streaming);
        assert!(controller.session().last_error().is_none());
    }

    #[test]
    fn test_change_track_failure_retry_restores_streaming() {
        let mut controller = streaming_broadcaster();
        let commands = controller.handle(playing(false, "A", 1_000));
        let Command::Call(change) = commands[0].clone() else {
            panic!("expected a call");
        };

        controller.handle(respond(change.clone(), server_error("No active room")));
        let session = controller.session();
        assert_eq!(session.status(), Status::Error);
        assert!(session.last_error().unwrap().message.contains("No active room"));

        let commands = controller.handle(UserCommand::Retry.into());
        assert_eq!(commands, vec![Command::Call(change)]);
        assert_eq!(controller.session().status(), Status::Streaming);
        assert_eq!(controller.session().current_track(), Some(&track("A")));
    }

    #[test]
    fn test_change_track_failure_after_stop_is_dropped() {
        let mut controller = streaming_broadcaster();
        let commands = controller.handle(playing(false, "A", 1_000));
        let Command::Call(change) = commands[0].clone() else {
            panic!("expected a call");
        };
        controller.handle(UserCommand::Stop.into());
        let stop = Operation::StopBroadcast {
            device_id: DEVICE.to_string(),
        };
        controller.handle(respond(stop, Ok(Response::Ack)));
        assert_eq!(controller.session().status(), Status::Ready);

        let commands = controller.handle(respond(change, server_error("No active room")));

        assert!(commands.is_empty());
        let session = controller.session();
        assert_eq!(session.status(), Status::Ready);
        assert!(session.last_error().is_none());
        assert!(controller.handle(UserCommand::Retry.into()).is_empty());
        assert_eq!(controller.session().status(), Status::Ready);
        assert!(controller.session().stream_url().is_none());
    }

    // =========================================================================
    // Room events
    // =========================================================================

    #[test]
    fn test_listener_round_trip_reflects_server_state() {
        let controller = streaming_listener();
        let session = controller.session();
        assert_eq!(session.status(), Status::Streaming);
        assert_eq!(session.listener_count(), 2);
        assert_eq!(session.current_track(), Some(&track("A")));
    }

    #[test]
    fn test_listener_start_joins_requested_room() {
        let mut controller = ready(Role::Listener);
        controller.handle(UserCommand::Start.into());

        let commands = controller.handle(respond(
            start_listening_op(),
            Ok(Response::ListeningStarted(ListeningStarted {
                listener_count: 1,
                now_playing: None,
            })),
        ));

        assert_eq!(commands, vec![Command::JoinRoom(ROOM.to_string())]);
    }

    #[test]
    fn test_listener_now_playing_changed() {
        let mut controller = streaming_listener();

        let commands = controller.handle(
            RoomEvent::NowPlayingChanged {
                count: 3,
                track: Some(track("B")),
            }
            .into(),
        );

        assert!(commands.is_empty());
        assert_eq!(controller.session().listener_count(), 3);
        assert_eq!(controller.session().current_track(), Some(&track("B")));
    }

    #[test]
    fn test_broadcaster_takes_only_count_from_now_playing() {
        let mut controller = streaming_broadcaster();
        controller.handle(playing(false, "A", 0));

        controller.handle(
            RoomEvent::NowPlayingChanged {
                count: 5,
                track: Some(track("Z")),
            }
            .into(),
        );

        assert_eq!(controller.session().listener_count(), 5);
        assert_eq!(controller.session().current_track(), Some(&track("A")));
    }

    #[test]
    fn test_listener_count_changed() {
        let mut controller = streaming_broadcaster();
        controller.handle(RoomEvent::ListenerCountChanged { count: 7 }.into());
        assert_eq!(controller.session().listener_count(), 7);
    }

    #[test]
    fn test_room_events_ignored_unless_streaming() {
        let mut controller = ready(Role::Listener);
        controller.handle(RoomEvent::ListenerCountChanged { count: 7 }.into());
        controller.handle(RoomEvent::RoomClosed.into());
        assert_eq!(controller.session().listener_count(), 0);
        assert_eq!(controller.session().status(), Status::Ready);
    }

    #[test]
    fn test_room_closed_resets_without_leaving() {
        let mut controller = streaming_listener();

        let commands = controller.handle(RoomEvent::RoomClosed.into());

        assert!(commands.is_empty());
        let session = controller.session();
        assert_eq!(session.status(), Status::Ready);
        assert!(session.current_track().is_none());
        assert_eq!(session.listener_count(), 0);
    }

    // =========================================================================
    // Sync
    // =========================================================================

    #[test]
    fn test_listener_sync_replaces_track() {
        let mut controller = streaming_listener();
        let sync = Operation::Sync {
            device_id: DEVICE.to_string(),
        };

        let commands = controller.handle(UserCommand::Sync.into());
        assert_eq!(commands, vec![Command::Call(sync.clone())]);
        assert_eq!(controller.session().status(), Status::Loading);

        controller.handle(respond(
            sync,
            Ok(Response::Synced(SyncSnapshot {
                listener_count: Some(6),
                now_playing: Some(track("C").at_position(61_000)),
            })),
        ));
        let session = controller.session();
        assert_eq!(session.status(), Status::Streaming);
        assert_eq!(session.current_track(), Some(&track("C")));
        assert_eq!(session.listener_count(), 6);
    }

    #[test]
    fn test_broadcaster_cannot_sync() {
        let mut controller = streaming_broadcaster();
        assert!(controller.handle(UserCommand::Sync.into()).is_empty());
        assert_eq!(controller.session().status(), Status::Streaming);
    }

    // =========================================================================
    // Device capability errors
    // =========================================================================

    #[rstest]
    #[case::initialization(Role::Broadcaster, DeviceErrorKind::Initialization, Some(RetryAction::ReconnectDevice))]
    #[case::authentication(Role::Listener, DeviceErrorKind::Authentication, Some(RetryAction::ReconnectDevice))]
    #[case::account(Role::Listener, DeviceErrorKind::Account, None)]
    #[case::broadcaster_playback(Role::Broadcaster, DeviceErrorKind::Playback, None)]
    #[case::listener_playback(
        Role::Listener,
        DeviceErrorKind::Playback,
        Some(RetryAction::Api(Operation::Sync { device_id: DEVICE.to_string() }))
    )]
    fn test_device_capability_errors(
        #[case] role: Role,
        #[case] kind: DeviceErrorKind,
        #[case] expected_retry: Option<RetryAction>,
    ) {
        let mut controller = ready(role);

        controller.handle(
            DeviceEvent::Error {
                kind,
                message: "sdk says no".to_string(),
            }
            .into(),
        );

        let session = controller.session();
        assert_eq!(session.status(), Status::Error);
        let error = session.last_error().unwrap();
        assert_eq!(error.message, kind.user_message());
        assert_eq!(error.retry, expected_retry);
    }

    // =========================================================================
    // Renaming and late responses
    // =========================================================================

    #[test]
    fn test_rename_room_before_streaming() {
        let mut controller = ready(Role::Broadcaster);
        controller.handle(UserCommand::RenameRoom("  mellow-disco ".to_string()).into());
        assert_eq!(controller.session().room_id(), "mellow-disco");

        let commands = controller.handle(UserCommand::Start.into());
        assert_matches!(
            commands.as_slice(),
            [Command::Call(Operation::StartBroadcast { room_name, .. })] if room_name == "mellow-disco"
        );
    }

    #[test]
    fn test_rename_room_ignored_while_streaming_or_listening() {
        let mut controller = streaming_broadcaster();
        controller.handle(UserCommand::RenameRoom("other".to_string()).into());
        assert_eq!(controller.session().room_id(), ROOM);

        let mut controller = ready(Role::Listener);
        controller.handle(UserCommand::RenameRoom("other".to_string()).into());
        assert_eq!(controller.session().room_id(), ROOM);
    }

    #[test]
    fn test_late_response_is_applied() {
        let mut controller = ready(Role::Broadcaster);
        controller.handle(UserCommand::Start.into());
        controller.handle(
            DeviceEvent::Error {
                kind: DeviceErrorKind::Initialization,
                message: "boom".to_string(),
            }
            .into(),
        );
        assert_eq!(controller.session().status(), Status::Error);

        controller.handle(respond(
            start_broadcast_op(),
            Ok(Response::BroadcastStarted(BroadcastStarted {
                room_id: ROOM.to_string(),
                stream_url: "http://party.test/listen/funky-jazz".to_string(),
                now_playing: None,
                listener_count: 0,
            })),
        ));

        assert_eq!(controller.session().status(), Status::Streaming);
        assert!(controller.session().last_error().is_none());
    }

    #[test]
    fn test_retry_without_action_does_nothing() {
        let mut controller = ready(Role::Listener);
        controller.handle(
            DeviceEvent::Error {
                kind: DeviceErrorKind::Account,
                message: "free tier".to_string(),
            }
            .into(),
        );

        assert!(controller.handle(UserCommand::Retry.into()).is_empty());
        assert_eq!(controller.session().status(), Status::Error);
    }
}

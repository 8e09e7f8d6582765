//! Room channel
//!
//! A persistent connection scoped to one room. Outbound it carries join and
//! leave intents; inbound it delivers [`RoomEvent`]s. Frames are JSON objects
//! tagged by `event`.
//!
//! There is no reconnection: once the connection drops, [`RoomChannel::next_event`]
//! returns `None` for good.

use futures_util::{SinkExt, StreamExt};
use partyline_api_client::Track;
use partyline_shared_config::ChannelConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Room channel errors
#[derive(Error, Debug)]
pub enum ChannelError {
    /// WebSocket handshake or transport failure
    #[error("Room channel connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connection is gone
    #[error("Room channel is closed")]
    Closed,
}

/// Result type for room channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Room-scoped events
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    ListenerCountChanged { count: u32 },
    NowPlayingChanged { count: u32, track: Option<Track> },
    RoomClosed,
}

/// Join or leave intent sent to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomIntent {
    Join(String),
    Leave(String),
}

// =============================================================================
// Wire frames
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum ClientFrame {
    Join { room_id: String },
    Leave { room_id: String },
}

impl From<RoomIntent> for ClientFrame {
    fn from(intent: RoomIntent) -> Self {
        match intent {
            RoomIntent::Join(room_id) => Self::Join { room_id },
            RoomIntent::Leave(room_id) => Self::Leave { room_id },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum ServerFrame {
    Listeners {
        number: u32,
    },
    Changed {
        number: u32,
        #[serde(default)]
        playing: Option<Track>,
    },
    Close,
}

impl From<ServerFrame> for RoomEvent {
    fn from(frame: ServerFrame) -> Self {
        match frame {
            ServerFrame::Listeners { number } => Self::ListenerCountChanged { count: number },
            ServerFrame::Changed { number, playing } => Self::NowPlayingChanged {
                count: number,
                track: playing,
            },
            ServerFrame::Close => Self::RoomClosed,
        }
    }
}

/// Decode an inbound text frame; unknown or malformed frames are skipped
pub(crate) fn parse_frame(text: &str) -> Option<RoomEvent> {
    match serde_json::from_str::<ServerFrame>(text) {
        Ok(frame) => Some(frame.into()),
        Err(e) => {
            warn!(error = %e, frame = %text, "Skipping unrecognized room frame");
            None
        }
    }
}

// =============================================================================
// Channel
// =============================================================================

/// Client side of a room channel
#[derive(Debug)]
pub struct RoomChannel {
    intents: mpsc::UnboundedSender<RoomIntent>,
    events: mpsc::UnboundedReceiver<RoomEvent>,
}

/// Far side of an in-memory channel
#[derive(Debug)]
pub struct RoomChannelPeer {
    intents: mpsc::UnboundedReceiver<RoomIntent>,
    events: mpsc::UnboundedSender<RoomEvent>,
}

impl RoomChannel {
    /// Open the WebSocket and start pumping frames
    pub async fn connect(config: &ChannelConfig) -> ChannelResult<Self> {
        let (socket, _) = connect_async(config.url.as_str()).await?;
        info!(url = %config.url, "Room channel connected");

        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(pump(socket, intent_rx, event_tx));

        Ok(Self {
            intents: intent_tx,
            events: event_rx,
        })
    }

    /// A channel wired to a [`RoomChannelPeer`] instead of a socket
    pub fn in_memory() -> (Self, RoomChannelPeer) {
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                intents: intent_tx,
                events: event_rx,
            },
            RoomChannelPeer {
                intents: intent_rx,
                events: event_tx,
            },
        )
    }

    pub fn join(&self, room_id: impl Into<String>) -> ChannelResult<()> {
        self.send(RoomIntent::Join(room_id.into()))
    }

    pub fn leave(&self, room_id: impl Into<String>) -> ChannelResult<()> {
        self.send(RoomIntent::Leave(room_id.into()))
    }

    fn send(&self, intent: RoomIntent) -> ChannelResult<()> {
        debug!(?intent, "Room intent");
        self.intents.send(intent).map_err(|_| ChannelError::Closed)
    }

    /// Next room event, or `None` once the connection is gone
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        self.events.recv().await
    }
}

impl RoomChannelPeer {
    /// Deliver an event to the channel's owner
    pub fn emit(&self, event: RoomEvent) -> ChannelResult<()> {
        self.events.send(event).map_err(|_| ChannelError::Closed)
    }

    /// Next join/leave intent sent by the channel's owner
    pub async fn next_intent(&mut self) -> Option<RoomIntent> {
        self.intents.recv().await
    }
}

async fn pump(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut intents: mpsc::UnboundedReceiver<RoomIntent>,
    events: mpsc::UnboundedSender<RoomEvent>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            intent = intents.recv() => {
                let Some(intent) = intent else {
                    let _ = sink.close().await;
                    break;
                };
                let text = match serde_json::to_string(&ClientFrame::from(intent)) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode room frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!(error = %e, "Room channel send failed");
                    break;
                }
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = parse_frame(&text) {
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Room channel closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Room channel receive failed");
                        break;
                    }
                }
            }
        }
    }
}

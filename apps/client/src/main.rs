use clap::{Parser, Subcommand};
use partyline::console::{parse_input, ConsoleInput, HELP};
use partyline::room_name::generate_room_name;
use partyline::{
    ConsoleDevice, ConsolePlayer, DeviceErrorKind, Role, RoomChannel, Session, SessionHandle,
    SessionRuntime, Status, SyncController,
};
use partyline_api_client::PartyApiClient;
use partyline_shared_config::ClientConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Share your playback with a room, or follow someone else's
#[derive(Debug, Parser)]
#[command(name = "partyline", version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Broadcast this device's playback
    Broadcast {
        /// Room name (a random one is picked when omitted)
        room: Option<String>,
    },
    /// Follow a broadcast
    Listen {
        /// Room to join
        room: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let config = ClientConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("partyline={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let (role, room) = match cli.mode {
        Mode::Broadcast { room } => (
            Role::Broadcaster,
            room.unwrap_or_else(generate_room_name),
        ),
        Mode::Listen { room } => (Role::Listener, room),
    };

    info!(
        %role,
        %room,
        server = %config.server.base_url,
        environment = %config.environment,
        device = %config.device.name,
        volume = config.device.volume,
        "Starting Partyline"
    );

    let api = PartyApiClient::new(&config.server)?;
    let channel = RoomChannel::connect(&config.channel).await?;

    let device_id = config
        .device
        .device_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let (device, player) = ConsoleDevice::adapter(device_id);

    // The console device streams no audio, so it has no use for the token itself.
    // Fetching one still checks the server credentials before the session starts.
    if let Err(e) = api.fetch_token().await {
        warn!(error = %e, "Failed to fetch playback token");
        player.report_error(DeviceErrorKind::Authentication, e.to_string())?;
    } else {
        debug!("Playback token acquired");
    }

    let handle = SessionRuntime::spawn(SyncController::new(role, room), api, channel, device);
    let printer = tokio::spawn(print_session(handle.subscribe()));

    println!("{}", HELP);
    run_console(&handle, &player).await?;

    handle.unload().await?;
    printer.abort();
    Ok(())
}

/// Read console lines until `quit` or end of input
async fn run_console(handle: &SessionHandle, player: &ConsolePlayer) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = match parse_input(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        let result = match input {
            ConsoleInput::Session(command) => handle.send(command).map_err(anyhow::Error::from),
            ConsoleInput::Play { track, position_ms } => {
                player.play(track, position_ms).map_err(anyhow::Error::from)
            }
            ConsoleInput::Pause => player.pause().map_err(anyhow::Error::from),
            ConsoleInput::Lost => player.lose().map_err(anyhow::Error::from),
            ConsoleInput::Help => {
                println!("{}", HELP);
                Ok(())
            }
            ConsoleInput::Quit => break,
        };

        if let Err(e) = result {
            println!("{}", e);
        }
    }

    Ok(())
}

/// Print the session whenever it changes
async fn print_session(mut state: watch::Receiver<Session>) {
    loop {
        let session = state.borrow_and_update().clone();
        print_status(&session);
        if state.changed().await.is_err() {
            break;
        }
    }
}

fn print_status(session: &Session) {
    match session.status() {
        Status::Error => {
            if let Some(error) = session.last_error() {
                let hint = if error.is_recoverable() {
                    " (type 'retry')"
                } else {
                    ""
                };
                println!("[error] {}{}", error, hint);
            }
        }
        status => {
            if let Some(text) = session.status_text() {
                println!("[{}] {}", status, text);
            }
        }
    }

    if session.status() == Status::Streaming {
        if let Some(url) = session.stream_url() {
            println!("  share: {}", url);
        }
        match session.current_track() {
            Some(track) => println!("  now playing: {} <{}>", track.name, track.open_url()),
            None => println!("  nothing playing"),
        }
        println!("  listeners: {}", session.listener_count());
    }
}

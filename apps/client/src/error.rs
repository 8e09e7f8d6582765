//! Client error types

use partyline_api_client::ApiError;
use partyline_shared_config::ConfigError;
use thiserror::Error;

use crate::channel::ChannelError;
use crate::device::DeviceError;

/// Errors surfaced by the client crate
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The session runtime has shut down
    #[error("Session is closed")]
    SessionClosed,

    #[error("Session runtime failed: {0}")]
    Runtime(#[from] tokio::task::JoinError),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

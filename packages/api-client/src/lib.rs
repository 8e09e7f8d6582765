//! Party server API client for Partyline
//!
//! This crate provides a client for the party server's HTTP API, covering:
//! - Broadcast lifecycle (start, stop, change track, pause)
//! - Listener lifecycle (start, stop, sync)
//! - Device transfer and token retrieval
//!
//! # Example
//!
//! ```rust,no_run
//! use partyline_api_client::PartyApiClient;
//! use partyline_shared_config::ServerConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PartyApiClient::new(&ServerConfig::with_url("http://localhost:5000"))?;
//!
//! let started = client.start_broadcast("device-1", "funky-jazz").await?;
//! println!("Share {}", started.stream_url);
//!
//! client.stop_broadcast("device-1").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;

pub use client::PartyApiClient;
pub use error::{ApiError, ApiResult};
pub use models::{BroadcastStarted, ListeningStarted, SyncSnapshot, Track, Transferred};

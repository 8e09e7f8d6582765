//! Shared test utilities for Partyline workspace
//!
//! This crate provides a mock party server for testing without network
//! dependencies. It is used by the API client and client runtime test
//! suites.
//!
//! # Mock Services
//!
//! - [`MockPartyServer`] - Mock party server answering the broadcast, listen,
//!   sync, transfer and token routes
//!
//! # Example
//!
//! ```rust,ignore
//! use partyline_test_utils::{routes, MockPartyServer};
//!
//! #[tokio::test]
//! async fn test_with_mocks() {
//!     let server = MockPartyServer::start().await;
//!     server.mock_ack(routes::BROADCAST_PAUSE).await;
//!
//!     // Use server.url() to configure your client
//! }
//! ```

mod party;

pub use party::{track_json, MockPartyServer};

/// Party server route paths
pub mod routes {
    pub use crate::party::{
        BROADCAST_CHANGE, BROADCAST_PAUSE, BROADCAST_START, BROADCAST_STOP, LISTEN_START,
        LISTEN_STOP, LISTEN_SYNC, STOP_BEACON, TOKEN, TRANSFER,
    };
}

//! Mock party server for testing the API client and session runtime
//!
//! Provides a [`MockPartyServer`] that simulates the party server's JSON API
//! without a real server.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BROADCAST_START: &str = "/api/broadcast/start";
pub const BROADCAST_STOP: &str = "/api/broadcast/stop";
pub const BROADCAST_CHANGE: &str = "/api/broadcast/change";
pub const BROADCAST_PAUSE: &str = "/api/broadcast/pause";
pub const LISTEN_START: &str = "/api/listen/start";
pub const LISTEN_STOP: &str = "/api/listen/stop";
pub const LISTEN_SYNC: &str = "/api/listen/sync";
pub const TRANSFER: &str = "/api/transfer";
pub const TOKEN: &str = "/api/token";
pub const STOP_BEACON: &str = "/api/stop";

/// Build the JSON for a track the way the party server reports it
pub fn track_json(uri: &str, name: &str) -> Value {
    let id = uri.rsplit(':').next().unwrap_or(uri);
    json!({
        "uri": uri,
        "id": id,
        "type": "track",
        "name": name
    })
}

/// Mock party server
///
/// Wraps a [`wiremock::MockServer`] with helpers for the party API routes.
/// Every route answers `POST`, and application errors come back as a 200
/// with an `{"error": "..."}` body, like the real server.
///
/// # Example
///
/// ```rust,ignore
/// use partyline_test_utils::MockPartyServer;
///
/// #[tokio::test]
/// async fn test_broadcast() {
///     let server = MockPartyServer::start().await;
///     server.mock_broadcast_start("funky-jazz", None, 0).await;
///
///     // Configure your client with server.url()
/// }
/// ```
pub struct MockPartyServer {
    server: MockServer,
}

impl MockPartyServer {
    /// Start a new mock party server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Get reference to the underlying mock server for custom mock setups
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    async fn mount_json(&self, route: &str, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mount a successful broadcast start for the given room
    pub async fn mock_broadcast_start(&self, room_id: &str, playing: Option<Value>, listeners: u32) {
        let mut body = json!({
            "room_id": room_id,
            "stream_url": format!("{}/listen/{}", self.url(), room_id),
            "number": listeners
        });
        if let Some(playing) = playing {
            body["playing"] = playing;
        }
        self.mount_json(BROADCAST_START, 200, body).await;
    }

    /// Mount a successful listen start
    pub async fn mock_listen_start(&self, listeners: u32, playing: Option<Value>) {
        self.mount_json(
            LISTEN_START,
            200,
            json!({ "number": listeners, "playing": playing }),
        )
        .await;
    }

    /// Mount a successful sync snapshot
    pub async fn mock_sync(&self, listeners: u32, playing: Option<Value>) {
        self.mount_json(
            LISTEN_SYNC,
            200,
            json!({ "number": listeners, "playing": playing }),
        )
        .await;
    }

    /// Mount a successful transfer
    pub async fn mock_transfer(&self, playing: Option<Value>) {
        self.mount_json(TRANSFER, 200, json!({ "playing": playing })).await;
    }

    /// Mount a token response
    pub async fn mock_token(&self, token: &str) {
        self.mount_json(TOKEN, 200, json!({ "token": token })).await;
    }

    /// Mount an empty `{}` acknowledgement for a route
    pub async fn mock_ack(&self, route: &str) {
        self.mount_json(route, 200, json!({})).await;
    }

    /// Mount the plain-text acknowledgement of the unload beacon
    pub async fn mock_stop_beacon(&self) {
        Mock::given(method("POST"))
            .and(path(STOP_BEACON))
            .respond_with(ResponseTemplate::new(200).set_body_string("stopped"))
            .mount(&self.server)
            .await;
    }

    /// Mount an application error (`200 {"error": message}`) for a route
    pub async fn mock_error(&self, route: &str, message: &str) {
        self.mount_json(route, 200, json!({ "error": message })).await;
    }

    /// Mount a bare HTTP status for a route
    pub async fn mock_status(&self, route: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string("server exploded"))
            .mount(&self.server)
            .await;
    }

    /// Mount a delayed acknowledgement (for timeout tests)
    pub async fn mock_delay(&self, route: &str, delay_ms: u64) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(delay_ms))
                    .set_body_json(json!({})),
            )
            .mount(&self.server)
            .await;
    }

    /// JSON bodies of every request received on a route, in arrival order
    ///
    /// Requests without a JSON body show up as `Value::Null`.
    pub async fn requests_to(&self, route: &str) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == route)
            .map(|request| serde_json::from_slice(&request.body).unwrap_or(Value::Null))
            .collect()
    }

    /// Number of requests received on a route
    pub async fn calls_to(&self, route: &str) -> usize {
        self.requests_to(route).await.len()
    }

    /// Wait until a route has received at least `count` requests
    ///
    /// Gives up after roughly two seconds and returns what was seen.
    pub async fn wait_for_calls(&self, route: &str, count: usize) -> usize {
        for _ in 0..200 {
            let seen = self.calls_to(route).await;
            if seen >= count {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.calls_to(route).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_party_server_starts() {
        let server = MockPartyServer::start().await;
        assert!(server.url().starts_with("http://"));
    }

    #[tokio::test]
    async fn test_mock_broadcast_start() {
        let server = MockPartyServer::start().await;
        server
            .mock_broadcast_start("funky-jazz", Some(track_json("spotify:track:A", "A")), 2)
            .await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("{}{}", server.url(), BROADCAST_START))
            .json(&json!({"device_id": "d1", "room_name": "funky-jazz"}))
            .send()
            .await
            .unwrap();

        assert!(response.status().is_success());
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["room_id"], "funky-jazz");
        assert_eq!(body["number"], 2);
        assert_eq!(body["playing"]["id"], "A");

        let requests = server.requests_to(BROADCAST_START).await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["device_id"], "d1");
    }

    #[tokio::test]
    async fn test_mock_error_is_200() {
        let server = MockPartyServer::start().await;
        server.mock_error(LISTEN_START, "Invalid room_id").await;

        let response = reqwest::Client::new()
            .post(format!("{}{}", server.url(), LISTEN_START))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Invalid room_id");
    }

    #[test]
    fn test_track_json_derives_id() {
        let track = track_json("spotify:track:xyz", "Song");
        assert_eq!(track["id"], "xyz");
        assert_eq!(track["type"], "track");
    }
}

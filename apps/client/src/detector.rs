//! Broadcaster track-change detection
//!
//! Compares what the device reports with what the session last recorded and
//! decides which notification, if any, the room needs.

use partyline_api_client::Track;

use crate::device::PlaybackSnapshot;

/// Outcome of comparing a device snapshot with the recorded state
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackChange {
    /// Playback was paused
    Paused,
    /// Playback resumed; the track carries the position to seek to
    Resumed(Track),
    /// A different track started without a pause in between
    Advanced(Track),
    Unchanged,
}

/// Detect the change between the recorded state and a new snapshot
///
/// Pause wins over everything, then resume, then a uri change. A missing
/// recorded track counts as a different uri.
pub fn detect_change(
    was_paused: bool,
    current: Option<&Track>,
    snapshot: &PlaybackSnapshot,
) -> PlaybackChange {
    if snapshot.paused && !was_paused {
        return PlaybackChange::Paused;
    }

    if !snapshot.paused && was_paused {
        return PlaybackChange::Resumed(
            snapshot.track.clone().at_position(snapshot.position_ms),
        );
    }

    if !snapshot.paused && current.map_or(true, |track| track.uri != snapshot.track.uri) {
        return PlaybackChange::Advanced(snapshot.track.clone().without_position());
    }

    PlaybackChange::Unchanged
}

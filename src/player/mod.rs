//! Media player adapter
//!
//! The driver talks to the player through the `PlayerClient` capability set:
//! best-effort, fire-and-forget commands plus a polled status. The concrete
//! implementation speaks VLC's HTTP interface; tests substitute a scripted
//! mock.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::errors::PlayerError;

pub mod http;
pub mod launcher;

pub use http::VlcHttpClient;
pub use launcher::VlcLauncher;

/// VLC numbers playlist entries from 3 onwards; ids handed out by the
/// registry start there so they line up with the player's own numbering.
pub const PLAYLIST_INDEX_OFFSET: i64 = 3;

/// Coarse player state, as reported by the status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
    Unknown,
}

impl PlayerState {
    pub fn from_label(label: &str) -> Self {
        match label {
            "stopped" => Self::Stopped,
            "playing" => Self::Playing,
            "paused" => Self::Paused,
            _ => Self::Unknown,
        }
    }
}

/// Snapshot of the player: coarse state plus the playback position in
/// seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub time: i64,
}

/// Capability set the playout driver needs from a media player.
#[async_trait]
pub trait PlayerClient: Send + Sync {
    /// Append a media file to the player's playlist.
    async fn enqueue(&self, path: &str) -> Result<(), PlayerError>;
    /// Start playing a playlist entry.
    async fn play(&self, playlist_id: i64) -> Result<(), PlayerError>;
    /// Jump to an absolute position, in seconds.
    async fn seek(&self, seconds: i64) -> Result<(), PlayerError>;
    async fn pause(&self) -> Result<(), PlayerError>;
    async fn stop(&self) -> Result<(), PlayerError>;
    /// Loop the current playlist entry.
    async fn set_loop(&self, enabled: bool) -> Result<(), PlayerError>;
    /// Repeat the whole playlist.
    async fn set_repeat(&self, enabled: bool) -> Result<(), PlayerError>;
    async fn status(&self) -> Result<PlayerStatus, PlayerError>;
}

/// Path-to-playlist-id map. Ids are assigned in enqueue order, offset by
/// [`PLAYLIST_INDEX_OFFSET`], and stay stable for the process lifetime;
/// re-registering a path hands back the existing id. Entries are never
/// evicted.
#[derive(Debug, Default)]
pub struct PlaylistRegistry {
    ids: HashMap<String, i64>,
}

impl PlaylistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<i64> {
        self.ids.get(path).copied()
    }

    /// The id for `path`, allocating the next one when unseen. Returns the
    /// id and whether it is new (a new id means the path still needs an
    /// enqueue command).
    pub fn assign(&mut self, path: &str) -> (i64, bool) {
        if let Some(id) = self.ids.get(path) {
            return (*id, false);
        }
        let id = self.ids.len() as i64 + PLAYLIST_INDEX_OFFSET;
        self.ids.insert(path.to_string(), id);
        (id, true)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

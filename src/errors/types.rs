//! Error type definitions for the playout scheduler
//!
//! Two families: `ScheduleError` covers everything that can go wrong while
//! compiling plans into a timeline, `PlayerError` covers the external media
//! player (transport, launch, status).

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised while loading plans and compiling the timeline
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// A time literal could not be parsed in any supported form
    #[error("bad time literal: '{input}'")]
    BadTimeLiteral { input: String },

    /// A plan file is malformed (unknown fields, wrong shapes, bad values)
    #[error("bad plan '{path}': {message}")]
    BadPlan { path: String, message: String },

    /// A media file's duration could not be probed
    #[error("unreadable media '{path}': {message}")]
    UnreadableMedia { path: String, message: String },

    /// The priority queue handed the resolver an out-of-order clip.
    /// This is an expander bug, not an input problem, and is fatal.
    #[error("clip '{path}' starting at {start_at} arrived out of order")]
    OutOfOrder {
        path: String,
        start_at: DateTime<Utc>,
    },

    /// The process configuration file is unusable
    #[error("bad configuration: {message}")]
    BadConfig { message: String },

    /// Filesystem errors while reading plans or writing artifacts
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the media player adapter
#[derive(Error, Debug)]
pub enum PlayerError {
    /// HTTP transport failure talking to the player
    #[error("player transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The player answered with a non-success HTTP status
    #[error("player returned HTTP {status}")]
    BadStatus { status: u16 },

    /// The player's status payload could not be parsed
    #[error("player status parse error: {0}")]
    StatusParse(#[from] serde_json::Error),

    /// The player process could not be launched or never became ready
    #[error("failed to launch player: {message}")]
    Launch { message: String },
}

impl ScheduleError {
    /// Create a bad-time-literal error
    pub fn bad_time_literal<S: Into<String>>(input: S) -> Self {
        Self::BadTimeLiteral {
            input: input.into(),
        }
    }

    /// Create a bad-plan error for a specific plan file
    pub fn bad_plan<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::BadPlan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an unreadable-media error for a specific clip path
    pub fn unreadable_media<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::UnreadableMedia {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn bad_config<M: Into<String>>(message: M) -> Self {
        Self::BadConfig {
            message: message.into(),
        }
    }
}

impl PlayerError {
    /// Create a launch error
    pub fn launch<M: Into<String>>(message: M) -> Self {
        Self::Launch {
            message: message.into(),
        }
    }
}

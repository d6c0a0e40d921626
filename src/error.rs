//! Error type shared by the library registry and the playback engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::library::{Format, TrackId};

pub type Result<T> = std::result::Result<T, PlayerError>;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// The file extension is not one of mp3/wav/flac/ogg.
    #[error("unsupported file type '{0}'")]
    UnsupportedFormat(String),

    /// No track with this id is registered.
    #[error("track not found: {0}")]
    NotFound(TrackId),

    /// Create, write, delete or scan failure on storage.
    #[error("unable to {action} '{}': {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot decode {format} track: {reason}")]
    Decode { format: Format, reason: String },

    /// Random play was requested but the library holds no tracks.
    #[error("the track library is empty")]
    EmptyLibrary,

    /// The output device could not be opened at all.
    #[error("audio output unavailable: {0}")]
    Output(String),

    /// The engine worker has exited and no longer accepts commands.
    #[error("playback engine is not running")]
    EngineStopped,

    #[error("button listener is not running")]
    ControlClosed,
}

impl PlayerError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

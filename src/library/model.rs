use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{PlayerError, Result};

// Fixed namespace so ids stay stable across restarts and rescans.
const TRACK_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d_29c4_8a53_4e0b_9b7e_2c61_d4a8_f035);

/// Stable track identifier derived from the storage-relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TrackId(Uuid);

impl TrackId {
    /// Derive the id of a track stored at `relative` under the storage root.
    ///
    /// The path is normalized first (`.` components dropped, `/` separators)
    /// so `a/./b.mp3` and `a/b.mp3` map to the same id on every platform.
    pub fn from_relative_path(relative: &Path) -> Self {
        Self(Uuid::new_v5(
            &TRACK_NAMESPACE,
            normalize(relative).as_bytes(),
        ))
    }
}

fn normalize(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TrackId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Container formats the player accepts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Mp3,
    Wav,
    Flac,
    Ogg,
}

impl Format {
    /// Match a file extension, case-insensitively and with or without a dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            "flac" => Some(Self::Flac),
            "ogg" => Some(Self::Ogg),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered audio file. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub id: TrackId,
    /// Location relative to the storage root.
    pub path: PathBuf,
    /// Fixed at creation from the file extension.
    pub format: Format,
    /// Display name (the file name).
    pub name: String,
}

impl Track {
    /// Build a track for a storage-relative path, rejecting unsupported extensions.
    pub fn new(relative: &Path) -> Result<Self> {
        let format = Format::from_path(relative).ok_or_else(|| {
            PlayerError::UnsupportedFormat(
                relative
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_else(|| relative.display().to_string()),
            )
        })?;

        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            id: TrackId::from_relative_path(relative),
            path: relative.to_path_buf(),
            format,
            name,
        })
    }
}

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/hifi-player/config.toml` or `~/.config/hifi-player/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `HIFI__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub library: LibrarySettings,
    pub volume: VolumeSettings,
    pub engine: EngineSettings,
    pub history: HistorySettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Directory holding the audio files. Created on startup when missing.
    pub storage_path: PathBuf,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("music"),
            follow_links: true,
        }
    }
}

/// Gain stage bounds. The applied gain is `base ^ current`, or silence when muted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    pub base: f64,
    /// Volume level at startup.
    pub initial: f64,
    pub min: f64,
    pub max: f64,
    /// Amount added or removed by one volume up/down step.
    pub step: f64,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            base: 2.0,
            initial: 0.0,
            min: -5.0,
            max: 2.0,
            step: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Poll interval of the playback worker (milliseconds).
    ///
    /// Bounds stop latency and sets the position sampling rate.
    pub tick_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { tick_ms: 1000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Number of finished sessions kept in memory.
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { capacity: 512 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive, used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::error::{PlayerError, Result};

use super::model::{Format, Track};

fn is_audio_file(path: &Path) -> bool {
    Format::from_path(path).is_some()
}

/// Walk `root` once and build a track for every supported audio file.
///
/// Non-audio files and directories are skipped. Any filesystem error aborts
/// the scan. The root is created when it does not exist yet.
pub fn scan(root: &Path, settings: &LibrarySettings) -> Result<Vec<Track>> {
    if !root.exists() {
        fs::create_dir_all(root).map_err(|e| PlayerError::io("create", root, e))?;
        info!(root = %root.display(), "created empty storage directory");
    }

    let mut tracks: Vec<Track> = Vec::new();

    for entry in WalkDir::new(root).follow_links(settings.follow_links) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            PlayerError::io("scan", path, io::Error::from(e))
        })?;

        let path = entry.path();
        if !entry.file_type().is_file() || !is_audio_file(path) {
            continue;
        }

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let track = Track::new(relative)?;
        debug!(id = %track.id, path = %track.path.display(), "found track");
        tracks.push(track);
    }

    Ok(tracks)
}

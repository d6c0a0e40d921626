//! The track registry: owns the catalog and the storage directory.
//!
//! All mutation happens under one `RwLock`. Removal keeps the write lock for
//! the whole release/delete/unregister sequence so a concurrent play request
//! can never observe a track whose file is being deleted.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::LibrarySettings;
use crate::error::{PlayerError, Result};

use super::model::{Track, TrackId};
use super::scan::scan;

pub struct Registry {
    root: PathBuf,
    tracks: RwLock<HashMap<TrackId, Track>>,
}

impl Registry {
    /// Scan `root` once and register every supported file found there.
    pub fn scan(root: &Path, settings: &LibrarySettings) -> Result<Self> {
        let registry = Self::empty(root);
        {
            let mut tracks = registry.write();
            for track in scan(root, settings)? {
                tracks.insert(track.id, track);
            }
            info!(root = %root.display(), count = tracks.len(), "track library loaded");
        }
        Ok(registry)
    }

    fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            tracks: RwLock::new(HashMap::new()),
        }
    }

    /// Absolute location of a registered track on storage.
    pub fn file_path(&self, track: &Track) -> PathBuf {
        self.root.join(&track.path)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, id: &TrackId) -> Option<Track> {
        self.read().get(id).cloned()
    }

    /// All tracks ordered by name, ties broken by id.
    pub fn list(&self) -> Vec<Track> {
        let mut tracks: Vec<Track> = self.read().values().cloned().collect();
        tracks.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        tracks
    }

    /// Run `f` on a registered track while holding the catalog read lock.
    ///
    /// Removal needs the write lock, so anything `f` hands to the engine is
    /// ordered before any removal of the same track.
    pub fn with_track<T>(&self, id: &TrackId, f: impl FnOnce(&Track, PathBuf) -> T) -> Result<T> {
        let tracks = self.read();
        let track = tracks.get(id).ok_or(PlayerError::NotFound(*id))?;
        Ok(f(track, self.file_path(track)))
    }

    /// Like [`Registry::with_track`] but on a uniformly random track.
    pub fn with_random_track<T>(&self, f: impl FnOnce(&Track, PathBuf) -> T) -> Result<T> {
        let tracks = self.read();
        if tracks.is_empty() {
            return Err(PlayerError::EmptyLibrary);
        }
        let pick = rand::random_range(0..tracks.len());
        let track = tracks.values().nth(pick).ok_or(PlayerError::EmptyLibrary)?;
        Ok(f(track, self.file_path(track)))
    }

    /// Store `data` under the storage root as `filename_hint` and register it.
    ///
    /// Only the final component of the hint is used. The extension is checked
    /// before storage is touched. Bytes go to a hidden temporary file that is
    /// renamed into place once complete, so a failed write never leaves a
    /// file that a rescan would pick up. Existing files are never replaced.
    pub fn add_track(&self, filename_hint: &str, data: &mut impl Read) -> Result<Track> {
        let name = Path::new(filename_hint)
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| PlayerError::UnsupportedFormat(filename_hint.to_string()))?;
        let track = Track::new(&name)?;
        let target = self.root.join(&name);

        let mut tmp = tempfile::Builder::new()
            .prefix(".upload-")
            .suffix(".part")
            .tempfile_in(&self.root)
            .map_err(|e| PlayerError::io("create", &self.root, e))?;
        copy_into(data, &mut tmp)
            .map_err(|e| PlayerError::io("write", tmp.path().to_path_buf(), e))?;

        // Hold the write lock across the rename so the file and the entry appear together.
        let mut tracks = self.write();
        tmp.persist_noclobber(&target)
            .map_err(|e| PlayerError::io("save", &target, e.error))?;
        tracks.insert(track.id, track.clone());

        info!(id = %track.id, name = %track.name, format = %track.format, "track added");
        Ok(track)
    }

    /// Delete a track's file and unregister it.
    ///
    /// `release` runs first with the write lock held and must return only
    /// once nothing holds the file open. If it or the deletion fails, the
    /// entry stays registered. A file that is already missing counts as
    /// deleted.
    pub fn remove_track(
        &self,
        id: &TrackId,
        release: impl FnOnce(&Track) -> Result<()>,
    ) -> Result<Track> {
        let mut tracks = self.write();
        let track = tracks.get(id).cloned().ok_or(PlayerError::NotFound(*id))?;

        release(&track)?;

        let path = self.file_path(&track);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(id = %track.id, path = %path.display(), "track file already gone; unregistering");
            }
            Err(e) => {
                warn!(id = %track.id, path = %path.display(), error = %e, "failed to delete track file");
                return Err(PlayerError::io("delete", path, e));
            }
        }
        tracks.remove(id);

        info!(id = %track.id, name = %track.name, "track removed");
        Ok(track)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TrackId, Track>> {
        self.tracks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TrackId, Track>> {
        self.tracks.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn copy_into(data: &mut impl Read, tmp: &mut NamedTempFile) -> io::Result<()> {
    io::copy(data, tmp)?;
    tmp.flush()?;
    tmp.as_file().sync_all()
}

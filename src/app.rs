//! Application facade: the track registry and the playback engine behind one
//! handle shared by every control surface.
//!
//! Cross-component sequencing lives here: play requests are queued while the
//! registry still vouches for the track, and removal releases the device
//! before the file is deleted.

use std::io::Read;
use std::sync::Arc;

use tracing::info;

use crate::audio::{Engine, PlayRequest, PlayerState, VolumeState};
use crate::error::{PlayerError, Result};
use crate::history::ListeningLog;
use crate::library::{Registry, Track, TrackId};


pub struct Jukebox {
    registry: Registry,
    engine: Engine,
    history: Arc<ListeningLog>,
}

impl Jukebox {
    pub fn new(registry: Registry, engine: Engine, history: Arc<ListeningLog>) -> Self {
        Self {
            registry,
            engine,
            history,
        }
    }

    pub fn list_tracks(&self) -> Vec<Track> {
        self.registry.list()
    }

    pub fn track(&self, id: &TrackId) -> Result<Track> {
        self.registry.get(id).ok_or(PlayerError::NotFound(*id))
    }

    pub fn track_count(&self) -> usize {
        self.registry.len()
    }

    pub fn add_track(&self, filename_hint: &str, data: &mut impl Read) -> Result<Track> {
        self.registry.add_track(filename_hint, data)
    }

    /// Remove a track, stopping it first if it is the one playing.
    pub fn remove_track(&self, id: &TrackId) -> Result<Track> {
        self.registry.remove_track(id, |track| self.engine.release(&track.id))
    }

    /// Play `id`, preempting whatever is playing.
    ///
    /// Blocks until the previous session is torn down and the new track was
    /// handed to the decoder. Load failures are logged by the engine, not
    /// returned.
    pub fn play_track(&self, id: &TrackId) -> Result<()> {
        let pending = self.registry.with_track(id, |track, file| {
            self.engine.enqueue_play(PlayRequest {
                track: track.clone(),
                file,
            })
        })??;
        pending.wait()
    }

    /// Play a uniformly chosen track and return it.
    pub fn play_random_track(&self) -> Result<Track> {
        let (track, pending) = self.registry.with_random_track(|track, file| {
            let pending = self.engine.enqueue_play(PlayRequest {
                track: track.clone(),
                file,
            });
            (track.clone(), pending)
        })?;
        pending?.wait()?;
        info!(id = %track.id, name = %track.name, "random track requested");
        Ok(track)
    }

    pub fn stop(&self) {
        self.engine.stop();
    }

    pub fn pause(&self) -> bool {
        self.engine.pause()
    }

    pub fn resume(&self) -> bool {
        self.engine.resume()
    }

    pub fn increase_volume(&self) -> VolumeState {
        self.engine.increase_volume()
    }

    pub fn decrease_volume(&self) -> VolumeState {
        self.engine.decrease_volume()
    }

    pub fn mute(&self, enable: bool) -> VolumeState {
        self.engine.mute(enable)
    }

    pub fn volume(&self) -> VolumeState {
        self.engine.volume()
    }

    pub fn state(&self) -> PlayerState {
        self.engine.state()
    }

    pub fn history(&self) -> &ListeningLog {
        &self.history
    }

    /// Stop playback and join the engine worker.
    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}

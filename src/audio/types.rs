//! Engine commands and the state shared between callers and the worker.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::library::{Track, TrackId};

use super::output::Playback;
use super::volume::VolumeState;

/// Observable snapshot of the player.
///
/// `current_track` set with `is_playing == false` means paused.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub is_muted: bool,
}

impl PlayerState {
    pub fn is_paused(&self) -> bool {
        self.current_track.is_some() && !self.is_playing
    }
}

/// A resolved play request: the track and its absolute file location.
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub track: Track,
    pub file: PathBuf,
}

#[derive(Debug)]
pub(super) enum EngineCmd {
    /// Tear down any session, then load and start the requested track.
    Play {
        request: PlayRequest,
        done: SyncSender<()>,
    },
    /// Tear down the session if it is playing `id`.
    Release { id: TrackId, done: SyncSender<()> },
    /// Tear down and exit the worker.
    Shutdown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) enum Phase {
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Listening time of the current session, excluding paused intervals.
#[derive(Debug, Default)]
pub(super) struct ListenClock {
    accumulated: Duration,
    resumed_at: Option<Instant>,
}

impl ListenClock {
    pub fn start(&mut self) {
        self.accumulated = Duration::ZERO;
        self.resumed_at = Some(Instant::now());
    }

    pub fn pause(&mut self) {
        if let Some(t) = self.resumed_at.take() {
            self.accumulated += t.elapsed();
        }
    }

    pub fn resume(&mut self) {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(Instant::now());
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.accumulated + self.resumed_at.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Stop the clock and return the total listening time.
    pub fn reset(&mut self) -> Duration {
        let elapsed = self.elapsed();
        *self = Self::default();
        elapsed
    }
}

/// Everything guarded by the engine's single critical section.
pub(super) struct Shared {
    pub phase: Phase,
    pub track: Option<Track>,
    pub volume: VolumeState,
    /// Live stream of the current session, present while playing or paused.
    pub stream: Option<Arc<dyn Playback>>,
    /// Cancellation flag of the session being loaded or played.
    pub cancel: Option<Arc<AtomicBool>>,
    pub clock: ListenClock,
}

impl Shared {
    pub fn new(volume: VolumeState) -> Self {
        Self {
            phase: Phase::Idle,
            track: None,
            volume,
            stream: None,
            cancel: None,
            clock: ListenClock::default(),
        }
    }

    pub fn snapshot(&self) -> PlayerState {
        PlayerState {
            current_track: self.track.clone(),
            is_playing: self.phase == Phase::Playing,
            is_muted: self.volume.silent,
        }
    }

    /// Push the current gain into the live stream, if any.
    pub fn apply_gain(&self) {
        if let Some(stream) = &self.stream {
            stream.set_gain(self.volume.gain());
        }
    }
}

pub(super) type SharedHandle = Arc<Mutex<Shared>>;

/// Lock the shared state, recovering from a poisoned mutex.
pub(super) fn lock(shared: &SharedHandle) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn listen_clock_excludes_paused_time() {
        let mut clock = ListenClock::default();
        clock.start();
        std::thread::sleep(Duration::from_millis(20));
        clock.pause();
        let at_pause = clock.elapsed();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(clock.elapsed(), at_pause);

        clock.resume();
        assert!(clock.elapsed() >= at_pause);
        let total = clock.reset();
        assert!(total >= Duration::from_millis(20));
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn player_state_serializes_with_camel_case_keys() {
        let track = Track::new(Path::new("a.mp3")).unwrap();
        let state = PlayerState {
            current_track: Some(track),
            is_playing: false,
            is_muted: true,
        };
        assert!(state.is_paused());

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["currentTrack"]["name"], "a.mp3");
        assert_eq!(json["isPlaying"], false);
        assert_eq!(json["isMuted"], true);

        let idle = serde_json::to_value(PlayerState::default()).unwrap();
        assert!(idle["currentTrack"].is_null());
    }
}

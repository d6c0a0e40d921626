use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::EngineSettings;
use crate::error::{PlayerError, Result};
use crate::history::SessionSink;
use crate::library::TrackId;

use super::output::AudioOutput;
use super::thread::spawn_engine_thread;
use super::types::{lock, EngineCmd, Phase, PlayRequest, PlayerState, Shared, SharedHandle};
use super::volume::VolumeState;

/// Handle to the playback engine.
///
/// Play and release requests go through the worker's command queue. Stop,
/// pause, resume and volume changes act directly on the shared state under
/// the engine lock.
pub struct Engine {
    tx: Sender<EngineCmd>,
    shared: SharedHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

/// A play request accepted by the queue but not yet processed.
#[must_use = "the request is processed asynchronously; call `wait` to block on it"]
pub struct PendingPlay {
    done: Receiver<()>,
}

impl PendingPlay {
    /// Block until the worker has torn down the previous session and
    /// attempted to load the requested track.
    pub fn wait(self) -> Result<()> {
        self.done.recv().map_err(|_| PlayerError::EngineStopped)
    }
}

impl Engine {
    /// Start the worker thread; `open_output` runs on it and a failure to open
    /// the device is returned here.
    pub fn start<O, F>(
        open_output: F,
        notifier: Arc<dyn SessionSink>,
        volume: VolumeState,
        settings: &EngineSettings,
    ) -> Result<Self>
    where
        O: AudioOutput,
        F: FnOnce() -> Result<O> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<EngineCmd>();
        let shared: SharedHandle = Arc::new(Mutex::new(Shared::new(volume)));
        let tick = Duration::from_millis(settings.tick_ms.max(1));

        let handle = spawn_engine_thread(open_output, rx, shared.clone(), notifier, tick)?;

        Ok(Self {
            tx,
            shared,
            join: Mutex::new(Some(handle)),
        })
    }

    /// Queue a play request without waiting for it.
    pub fn enqueue_play(&self, request: PlayRequest) -> Result<PendingPlay> {
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        self.tx
            .send(EngineCmd::Play {
                request,
                done: done_tx,
            })
            .map_err(|_| PlayerError::EngineStopped)?;
        Ok(PendingPlay { done: done_rx })
    }

    pub fn play(&self, request: PlayRequest) -> Result<()> {
        self.enqueue_play(request)?.wait()
    }

    /// Tear down the session if it is playing `id`, and wait for it.
    pub fn release(&self, id: &TrackId) -> Result<()> {
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        self.tx
            .send(EngineCmd::Release {
                id: *id,
                done: done_tx,
            })
            .map_err(|_| PlayerError::EngineStopped)?;
        done_rx.recv().map_err(|_| PlayerError::EngineStopped)
    }

    /// Signal the current session to stop. Never blocks on the teardown.
    pub fn stop(&self) {
        let shared = lock(&self.shared);
        if let Some(cancel) = &shared.cancel {
            cancel.store(true, Ordering::SeqCst);
            debug!("stop requested");
        }
    }

    /// Returns whether the engine went from playing to paused.
    pub fn pause(&self) -> bool {
        let mut shared = lock(&self.shared);
        if shared.phase != Phase::Playing {
            return false;
        }
        if let Some(stream) = &shared.stream {
            stream.set_paused(true);
        }
        shared.phase = Phase::Paused;
        shared.clock.pause();
        true
    }

    /// Returns whether the engine went from paused to playing.
    pub fn resume(&self) -> bool {
        let mut shared = lock(&self.shared);
        if shared.phase != Phase::Paused {
            return false;
        }
        if let Some(stream) = &shared.stream {
            stream.set_paused(false);
        }
        shared.phase = Phase::Playing;
        shared.clock.resume();
        true
    }

    pub fn increase_volume(&self) -> VolumeState {
        self.update_volume(VolumeState::increase)
    }

    pub fn decrease_volume(&self) -> VolumeState {
        self.update_volume(VolumeState::decrease)
    }

    pub fn mute(&self, enable: bool) -> VolumeState {
        self.update_volume(|v| v.mute(enable))
    }

    pub fn volume(&self) -> VolumeState {
        lock(&self.shared).volume
    }

    pub fn state(&self) -> PlayerState {
        lock(&self.shared).snapshot()
    }

    /// Tear down any session and join the worker. Idempotent.
    pub fn shutdown(&self) {
        let handle = self
            .join
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            let _ = self.tx.send(EngineCmd::Shutdown);
            if handle.join().is_err() {
                tracing::error!("playback engine thread panicked");
            }
            info!("engine shut down");
        }
    }

    fn update_volume(&self, f: impl FnOnce(&mut VolumeState)) -> VolumeState {
        let mut shared = lock(&self.shared);
        f(&mut shared.volume);
        shared.apply_gain();
        shared.volume
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

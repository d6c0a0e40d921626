use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::error::{PlayerError, Result};
use crate::history::{EndReason, SessionReport, SessionSink};
use crate::library::Track;

use super::output::{AudioOutput, Playback};
use super::types::{lock, EngineCmd, Phase, PlayRequest, SharedHandle};

/// Spawn the worker that owns the output device.
///
/// `open_output` runs on the worker thread itself; its failure is returned
/// here and the thread exits.
pub(super) fn spawn_engine_thread<O, F>(
    open_output: F,
    rx: Receiver<EngineCmd>,
    shared: SharedHandle,
    notifier: Arc<dyn SessionSink>,
    tick: Duration,
) -> Result<JoinHandle<()>>
where
    O: AudioOutput,
    F: FnOnce() -> Result<O> + Send + 'static,
{
    let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);

    let handle = thread::Builder::new()
        .name("playback-engine".to_string())
        .spawn(move || {
            let output = match open_output() {
                Ok(output) => {
                    let _ = ready_tx.send(Ok(()));
                    output
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            Worker {
                output,
                shared,
                notifier,
                tick,
                session: None,
            }
            .run(rx);
        })
        .map_err(|e| PlayerError::Output(format!("failed to spawn playback thread: {e}")))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => Err(PlayerError::EngineStopped),
    }
}

struct Session {
    track: Track,
    playback: Arc<dyn Playback>,
    cancel: Arc<AtomicBool>,
    started_at: DateTime<Utc>,
    last_sample: Instant,
    position_supported: bool,
}

enum Poll {
    Continue,
    End(EndReason),
}

struct Worker<O> {
    output: O,
    shared: SharedHandle,
    notifier: Arc<dyn SessionSink>,
    tick: Duration,
    session: Option<Session>,
}

impl<O: AudioOutput> Worker<O> {
    fn run(mut self, rx: Receiver<EngineCmd>) {
        info!(tick_ms = self.tick.as_millis() as u64, "playback engine started");

        loop {
            match rx.recv_timeout(self.tick) {
                Ok(EngineCmd::Play { request, done }) => {
                    self.play(request);
                    let _ = done.send(());
                }
                Ok(EngineCmd::Release { id, done }) => {
                    if self.session.as_ref().is_some_and(|s| s.track.id == id) {
                        self.finish(EndReason::Removed);
                    }
                    let _ = done.send(());
                }
                Ok(EngineCmd::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    self.finish(EndReason::Shutdown);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            if let Poll::End(reason) = self.poll() {
                self.finish(reason);
            }
        }

        info!("playback engine stopped");
    }

    /// Preempt any running session, then load and start `request`.
    ///
    /// Returns once the new session is playing or loading has failed; the
    /// caller's acknowledgement is sent only after that.
    fn play(&mut self, request: PlayRequest) {
        self.finish(EndReason::Preempted);

        let PlayRequest { track, file } = request;
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut shared = lock(&self.shared);
            shared.phase = Phase::Loading;
            shared.cancel = Some(cancel.clone());
        }
        debug!(id = %track.id, path = %file.display(), "loading track");

        let opened = File::open(&file)
            .map_err(|e| PlayerError::io("open", &file, e))
            .and_then(|f| self.output.open(f, track.format));

        let playback = match opened {
            Ok(playback) => playback,
            Err(e) => {
                error!(id = %track.id, name = %track.name, error = %e, "failed to load track");
                let mut shared = lock(&self.shared);
                shared.phase = Phase::Idle;
                shared.cancel = None;
                return;
            }
        };

        {
            let mut shared = lock(&self.shared);
            if cancel.load(Ordering::SeqCst) {
                playback.release();
                shared.phase = Phase::Idle;
                shared.cancel = None;
                info!(id = %track.id, "stopped while loading");
                return;
            }

            playback.set_gain(shared.volume.gain());
            playback.set_paused(false);
            shared.phase = Phase::Playing;
            shared.track = Some(track.clone());
            shared.stream = Some(playback.clone());
            shared.clock.start();
        }

        let info = playback.info();
        info!(
            id = %track.id,
            name = %track.name,
            format = %track.format,
            sample_rate = info.sample_rate,
            channels = info.channels,
            length_secs = info.total.map(|d| d.as_secs()),
            "playing track"
        );

        self.session = Some(Session {
            track,
            playback,
            cancel,
            started_at: Utc::now(),
            last_sample: Instant::now(),
            position_supported: true,
        });
    }

    /// Check the running session for cancellation and end of stream, and
    /// sample its position once per tick.
    fn poll(&mut self) -> Poll {
        let Some(session) = self.session.as_mut() else {
            return Poll::Continue;
        };

        if session.cancel.load(Ordering::SeqCst) {
            return Poll::End(EndReason::Stopped);
        }

        let paused = lock(&self.shared).phase == Phase::Paused;
        if paused {
            return Poll::Continue;
        }

        if session.playback.is_finished() {
            return Poll::End(EndReason::Finished);
        }

        if session.last_sample.elapsed() >= self.tick {
            session.last_sample = Instant::now();
            match session.playback.position() {
                Some(pos) => {
                    debug!(id = %session.track.id, position_secs = pos.as_secs(), "position")
                }
                None if session.position_supported => {
                    session.position_supported = false;
                    warn!(id = %session.track.id, "output does not report a playback position");
                }
                None => {}
            }
        }

        Poll::Continue
    }

    /// The single teardown path for every way a session can end.
    ///
    /// Releases the stream and resets the shared state in one critical
    /// section, then notifies the session sink with the device unbound.
    fn finish(&mut self, reason: EndReason) {
        let Some(session) = self.session.take() else {
            return;
        };

        let elapsed = {
            let mut shared = lock(&self.shared);
            session.playback.release();
            shared.stream = None;
            shared.cancel = None;
            shared.track = None;
            shared.phase = Phase::Idle;
            shared.clock.reset()
        };

        info!(
            id = %session.track.id,
            name = %session.track.name,
            reason = %reason,
            elapsed_secs = elapsed.as_secs(),
            "session finished"
        );

        self.notifier.session_finished(&SessionReport {
            track: session.track,
            started_at: session.started_at,
            elapsed,
            reason,
        });
    }
}

//! In-memory output device for tests.
//!
//! Streams are labelled by the content of the file they were opened from.
//! Content starting with `garbage` fails to decode. An open can be held
//! mid-load with [`MockDevice::hold_next_open`].

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::EngineSettings;
use crate::error::{PlayerError, Result};
use crate::history::{SessionReport, SessionSink};
use crate::library::{Format, Track};

use super::output::{AudioOutput, Playback, StreamInfo};
use super::player::Engine;
use super::types::PlayRequest;
use super::volume::VolumeState;

#[derive(Default)]
pub(crate) struct DeviceLog {
    pub events: Vec<String>,
    pub active: usize,
    pub max_active: usize,
    streams: Vec<Arc<MockPlayback>>,
}

/// Shared view of everything the mock device and session sink observed.
#[derive(Clone, Default)]
pub(crate) struct MockDevice {
    log: Arc<Mutex<DeviceLog>>,
    gate: Arc<Mutex<Option<Gate>>>,
}

struct Gate {
    entered: mpsc::Sender<()>,
    proceed: mpsc::Receiver<()>,
}

/// Test side of a held open: `entered` fires once the worker is inside
/// `open`, and sending on `proceed` lets it finish.
pub(crate) struct HeldOpen {
    pub entered: mpsc::Receiver<()>,
    pub proceed: mpsc::Sender<()>,
}

impl MockDevice {
    pub fn log(&self) -> MutexGuard<'_, DeviceLog> {
        self.log.lock().unwrap()
    }

    /// Block the next `open` until the test lets it proceed.
    pub fn hold_next_open(&self) -> HeldOpen {
        let (entered_tx, entered) = mpsc::channel();
        let (proceed, proceed_rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(Gate {
            entered: entered_tx,
            proceed: proceed_rx,
        });
        HeldOpen { entered, proceed }
    }

    pub fn events(&self) -> Vec<String> {
        self.log().events.clone()
    }

    fn stream(&self, label: &str) -> Arc<MockPlayback> {
        self.log()
            .streams
            .iter()
            .rev()
            .find(|s| s.label == label)
            .cloned()
            .unwrap_or_else(|| panic!("no stream labelled {label}"))
    }

    /// Make the latest stream labelled `label` run out of samples.
    pub fn end_of_stream(&self, label: &str) {
        self.stream(label).finished.store(true, Ordering::SeqCst);
    }

    pub fn gain(&self, label: &str) -> f32 {
        *self.stream(label).gain.lock().unwrap()
    }

    pub fn is_paused(&self, label: &str) -> bool {
        self.stream(label).paused.load(Ordering::SeqCst)
    }
}

pub(crate) struct MockOutput {
    device: MockDevice,
}

impl AudioOutput for MockOutput {
    fn open(&mut self, mut file: File, format: Format) -> Result<Arc<dyn Playback>> {
        let gate = self.device.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.proceed.recv();
        }

        let mut content = String::new();
        file.read_to_string(&mut content).map_err(|e| PlayerError::Decode {
            format,
            reason: e.to_string(),
        })?;
        if content.starts_with("garbage") {
            return Err(PlayerError::Decode {
                format,
                reason: "no decodable frames".to_string(),
            });
        }

        let stream = Arc::new(MockPlayback {
            label: content.clone(),
            device: self.device.clone(),
            file: Mutex::new(Some(file)),
            paused: AtomicBool::new(true),
            finished: AtomicBool::new(false),
            gain: Mutex::new(1.0),
        });

        let mut log = self.device.log();
        log.events.push(format!("open {content}"));
        log.active += 1;
        log.max_active = log.max_active.max(log.active);
        log.streams.push(stream.clone());
        Ok(stream)
    }
}

struct MockPlayback {
    label: String,
    device: MockDevice,
    file: Mutex<Option<File>>,
    paused: AtomicBool,
    finished: AtomicBool,
    gain: Mutex<f32>,
}

impl Playback for MockPlayback {
    fn info(&self) -> StreamInfo {
        StreamInfo {
            sample_rate: 44_100,
            channels: 2,
            total: None,
        }
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    fn set_gain(&self, gain: f32) {
        *self.gain.lock().unwrap() = gain;
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn position(&self) -> Option<Duration> {
        None
    }

    fn release(&self) {
        if self.file.lock().unwrap().take().is_some() {
            let mut log = self.device.log();
            log.active -= 1;
            log.events.push(format!("release {}", self.label));
        }
    }
}

/// Session sink that keeps every report and mirrors it into the device log.
pub(crate) struct RecordingSink {
    device: MockDevice,
    reports: Mutex<Vec<SessionReport>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<SessionReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl SessionSink for RecordingSink {
    fn session_finished(&self, report: &SessionReport) {
        self.device
            .log()
            .events
            .push(format!("finished {} {}", report.track.name, report.reason));
        self.reports.lock().unwrap().push(report.clone());
    }
}

pub(crate) const TEST_TICK_MS: u64 = 10;

/// Engine over a fresh mock device with a short polling tick.
pub(crate) fn engine() -> (Engine, MockDevice, Arc<RecordingSink>) {
    let device = MockDevice::default();
    let sink = Arc::new(RecordingSink {
        device: device.clone(),
        reports: Mutex::new(Vec::new()),
    });
    let engine = engine_with(&device, sink.clone());
    (engine, device, sink)
}

/// Engine over `device` reporting finished sessions to `sink`.
pub(crate) fn engine_with(device: &MockDevice, sink: Arc<dyn SessionSink>) -> Engine {
    let output = MockOutput {
        device: device.clone(),
    };
    Engine::start(
        move || Ok(output),
        sink,
        VolumeState::default(),
        &EngineSettings {
            tick_ms: TEST_TICK_MS,
        },
    )
    .unwrap()
}

/// Write `name` into `dir` with its own name as content and build a request.
pub(crate) fn request(dir: &Path, name: &str) -> PlayRequest {
    request_with(dir, name, name)
}

pub(crate) fn request_with(dir: &Path, name: &str, content: &str) -> PlayRequest {
    let file: PathBuf = dir.join(name);
    fs::write(&file, content).unwrap();
    PlayRequest {
        track: Track::new(Path::new(name)).unwrap(),
        file,
    }
}

/// Poll `cond` until it holds or a generous deadline passes.
pub(crate) fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

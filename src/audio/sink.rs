//! `rodio`-backed output device.
//!
//! Decoded sources are wrapped so the worker can drop the decoder (and with
//! it the open file) synchronously, instead of waiting for the mixer thread
//! to notice a stopped sink.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rodio::{ChannelCount, Decoder, OutputStream, OutputStreamBuilder, SampleRate, Sink, Source};

use crate::error::{PlayerError, Result};
use crate::library::Format;

use super::output::{AudioOutput, Playback, StreamInfo};

type FileDecoder = Decoder<BufReader<File>>;

/// Frames pulled from the decoder per lock of its slot.
const CHUNK_FRAMES: usize = 1024;

/// A decoded, not yet bound, stream.
pub(super) struct Decoded {
    pub source: FileDecoder,
    pub info: StreamInfo,
}

/// Initialize a decoder over an open file, hinted with the track's format.
pub(super) fn decode(file: File, format: Format) -> Result<Decoded> {
    let fail = |reason: String| PlayerError::Decode { format, reason };
    let byte_len = file.metadata().map_err(|e| fail(e.to_string()))?.len();

    let source = Decoder::builder()
        .with_data(BufReader::new(file))
        .with_byte_len(byte_len)
        .with_hint(format.as_str())
        .with_seekable(true)
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let info = StreamInfo {
        sample_rate: u32::from(source.sample_rate()),
        channels: u16::from(source.channels()),
        total: source.total_duration(),
    };
    Ok(Decoded { source, info })
}

pub struct RodioOutput {
    stream: OutputStream,
}

impl RodioOutput {
    /// Open the system default output device.
    pub fn open_default() -> Result<Self> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| PlayerError::Output(e.to_string()))?;
        // rodio prints to stderr when the stream is dropped.
        stream.log_on_drop(false);
        Ok(Self { stream })
    }
}

impl AudioOutput for RodioOutput {
    fn open(&mut self, file: File, format: Format) -> Result<Arc<dyn Playback>> {
        let Decoded { source, info } = decode(file, format)?;

        let (source, handle) = Releasable::new(source);
        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        sink.append(source);

        Ok(Arc::new(RodioPlayback { sink, handle, info }))
    }
}

struct RodioPlayback {
    sink: Sink,
    handle: ReleaseHandle<FileDecoder>,
    info: StreamInfo,
}

impl Playback for RodioPlayback {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn set_paused(&self, paused: bool) {
        if paused {
            self.sink.pause();
        } else {
            self.sink.play();
        }
    }

    fn set_gain(&self, gain: f32) {
        self.sink.set_volume(gain);
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }

    fn position(&self) -> Option<Duration> {
        Some(self.sink.get_pos())
    }

    fn release(&self) {
        self.sink.stop();
        self.handle.release();
    }
}

/// Owner-side handle that takes the decoder away from a [`Releasable`].
struct ReleaseHandle<S> {
    slot: Arc<Mutex<Option<S>>>,
    released: Arc<AtomicBool>,
}

impl<S> ReleaseHandle<S> {
    /// Silence the source and drop the decoder before returning.
    fn release(&self) {
        self.released.store(true, Ordering::Release);
        let decoder = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(decoder);
    }
}

/// Source whose inner decoder can be taken away from outside the mixer.
///
/// Samples are pulled in chunks that never cross a span of the inner
/// source, so the slot is locked once per chunk rather than per sample.
/// Once released it reports an empty span and yields nothing, so the mixer
/// discards it on its next pull.
struct Releasable<S: Source> {
    slot: Arc<Mutex<Option<S>>>,
    released: Arc<AtomicBool>,
    buffer: VecDeque<S::Item>,
    /// Samples of the current inner span not yet pulled into `buffer`.
    span_left: Option<usize>,
    channels: ChannelCount,
    sample_rate: SampleRate,
    total: Option<Duration>,
}

impl<S: Source> Releasable<S> {
    fn new(source: S) -> (Self, ReleaseHandle<S>) {
        let handle = ReleaseHandle {
            slot: Arc::new(Mutex::new(None)),
            released: Arc::new(AtomicBool::new(false)),
        };
        let mut this = Self {
            slot: handle.slot.clone(),
            released: handle.released.clone(),
            buffer: VecDeque::new(),
            span_left: Some(0),
            channels: source.channels(),
            sample_rate: source.sample_rate(),
            total: source.total_duration(),
        };
        *this.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(source);
        this.refill();
        (this, handle)
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn refill(&mut self) {
        let mut guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(inner) = guard.as_mut() else {
            self.span_left = Some(0);
            return;
        };

        // A new inner span may change the stream parameters.
        if self.span_left.is_none_or(|left| left == 0) {
            self.channels = inner.channels();
            self.sample_rate = inner.sample_rate();
            self.span_left = inner.current_span_len();
        }

        let chunk = CHUNK_FRAMES * usize::from(u16::from(self.channels)).max(1);
        let limit = match self.span_left {
            Some(left) if left > 0 => left.min(chunk),
            _ => chunk,
        };

        let mut pulled = 0;
        while pulled < limit {
            match inner.next() {
                Some(sample) => {
                    self.buffer.push_back(sample);
                    pulled += 1;
                }
                None => break,
            }
        }

        self.span_left = if pulled < limit {
            Some(0)
        } else {
            self.span_left.map(|left| left.saturating_sub(pulled))
        };
    }
}

impl<S: Source> Iterator for Releasable<S> {
    type Item = S::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_released() {
            self.buffer.clear();
            return None;
        }
        let sample = self.buffer.pop_front()?;
        if self.buffer.is_empty() {
            self.refill();
        }
        Some(sample)
    }
}

impl<S: Source> Source for Releasable<S> {
    fn current_span_len(&self) -> Option<usize> {
        if self.is_released() || self.buffer.is_empty() {
            return Some(0);
        }
        self.span_left.map(|left| self.buffer.len() + left)
    }

    fn channels(&self) -> ChannelCount {
        self.channels
    }

    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        self.total
    }
}

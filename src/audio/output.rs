//! The seam between the engine worker and the audio backend.
//!
//! The worker is the only caller of [`AudioOutput`]; the [`Playback`] it
//! returns is also reachable from caller threads, but only under the engine's
//! state lock.

use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::library::Format;

/// Metadata reported by the decoder when a stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub total: Option<Duration>,
}

/// The exclusive output device.
pub trait AudioOutput {
    /// Decode `file` as `format` and bind it to the device, paused.
    fn open(&mut self, file: File, format: Format) -> Result<Arc<dyn Playback>>;
}

/// One decoded stream bound to the output device.
pub trait Playback: Send + Sync {
    fn info(&self) -> StreamInfo;

    /// Freeze or unfreeze sample advancement.
    fn set_paused(&self, paused: bool);

    fn set_gain(&self, gain: f32);

    /// True once the decoder has delivered its last sample.
    fn is_finished(&self) -> bool;

    /// Decode position, when the backend can report it.
    fn position(&self) -> Option<Duration>;

    /// Unbind from the device and drop the decoder and its file handle.
    ///
    /// Must not return before the file is closed.
    fn release(&self);
}

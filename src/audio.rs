//! Playback engine.
//!
//! One worker thread owns the output device and drains an ordered command
//! queue; everything else talks to it through [`Engine`]. Player state,
//! volume and the live stream handle share a single mutex so snapshots are
//! always consistent with the session the worker is running.

#[cfg(test)]
pub(crate) mod mock;
mod output;
mod player;
mod sink;
mod thread;
mod types;
mod volume;

pub use output::{AudioOutput, Playback, StreamInfo};
pub use player::{Engine, PendingPlay};
pub use sink::RodioOutput;
pub use types::{PlayRequest, PlayerState};
pub use volume::VolumeState;

//! Music library: the track entity, storage scanning and the track registry.
//!
//! Tracks live under a single storage root. Their ids are derived from the
//! storage-relative path so a rescan never renumbers anything.

mod model;
mod registry;
mod scan;

pub use model::{Format, Track, TrackId};
pub use registry::Registry;

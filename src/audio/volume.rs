//! Bounded gain state applied to the active stream.

use serde::Serialize;

use crate::config::VolumeSettings;

/// Volume level plus mute flag.
///
/// `current` is an exponent: the linear gain is `base ^ current`, so with the
/// default base of 2 each step of 1.0 doubles or halves the loudness. Every
/// mutation clamps into `[min, max]` instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeState {
    pub base: f64,
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub silent: bool,
}

impl VolumeState {
    pub fn from_settings(settings: &VolumeSettings) -> Self {
        let mut volume = Self {
            base: settings.base,
            current: 0.0,
            min: settings.min,
            max: settings.max,
            step: settings.step,
            silent: false,
        };
        volume.set(settings.initial);
        volume
    }

    pub fn set(&mut self, level: f64) {
        self.current = level.clamp(self.min, self.max);
    }

    pub fn increase(&mut self) {
        self.set(self.current + self.step);
    }

    pub fn decrease(&mut self) {
        self.set(self.current - self.step);
    }

    /// Silence or restore output. `current` is left untouched.
    pub fn mute(&mut self, enable: bool) {
        self.silent = enable;
    }

    /// Linear multiplier for the output stage.
    pub fn gain(&self) -> f32 {
        if self.silent {
            0.0
        } else {
            self.base.powf(self.current) as f32
        }
    }
}

impl Default for VolumeState {
    fn default() -> Self {
        Self::from_settings(&VolumeSettings::default())
    }
}

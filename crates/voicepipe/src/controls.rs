//! Shared playback scalars: volume, speed, and the interrupt epoch.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use log::info;

/// Volume, speed, and interrupt state shared between the engine and its
/// workers. Scalars are stored as f32 bit patterns in atomics: readers see
/// whole values (no torn reads) and the last writer wins, which is all the
/// pipeline needs.
#[derive(Debug)]
pub struct PlaybackControls {
    volume_bits: AtomicU32,
    speed_bits: AtomicU32,
    /// Bumped by `stop()`; a clip aborts when the epoch moves mid-play.
    epoch: AtomicU64,
}

impl PlaybackControls {
    pub fn new() -> Self {
        Self {
            volume_bits: AtomicU32::new(1.0f32.to_bits()),
            speed_bits: AtomicU32::new(1.0f32.to_bits()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Current playback volume in [0.0, 1.0].
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    /// Set the playback volume, clamped to [0.0, 1.0].
    pub fn set_volume(&self, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        self.volume_bits.store(clamped.to_bits(), Ordering::Relaxed);
        info!("volume set to {clamped:.2}");
    }

    /// Current speaking speed in [0.5, 2.0].
    pub fn speed(&self) -> f32 {
        f32::from_bits(self.speed_bits.load(Ordering::Relaxed))
    }

    /// Set the speaking speed, clamped to [0.5, 2.0].
    pub fn set_speed(&self, speed: f32) {
        let clamped = speed.clamp(0.5, 2.0);
        self.speed_bits.store(clamped.to_bits(), Ordering::Relaxed);
        info!("speed set to {clamped:.2}x");
    }

    /// Epoch observed by a clip when it starts playing.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Interrupt whatever is playing: any clip that started under an older
    /// epoch stops at its next progress check.
    pub fn interrupt_playback(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for PlaybackControls {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_clamping() {
        let controls = PlaybackControls::new();
        controls.set_volume(5.0);
        assert_eq!(controls.volume(), 1.0);
        controls.set_volume(-0.3);
        assert_eq!(controls.volume(), 0.0);
        controls.set_volume(0.8);
        assert!((controls.volume() - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_speed_clamping() {
        let controls = PlaybackControls::new();
        controls.set_speed(0.1);
        assert_eq!(controls.speed(), 0.5);
        controls.set_speed(9.0);
        assert_eq!(controls.speed(), 2.0);
    }

    #[test]
    fn test_interrupt_bumps_epoch() {
        let controls = PlaybackControls::new();
        let before = controls.epoch();
        controls.interrupt_playback();
        assert_eq!(controls.epoch(), before + 1);
    }
}

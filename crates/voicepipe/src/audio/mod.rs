//! Audio handling: WAV decoding, resampling, device selection, playback.

pub mod decode;
pub mod device;
pub mod playback;
pub mod resample;

/// Decoded PCM audio with samples normalized to [-1.0, 1.0].
///
/// Samples are interleaved when `channels > 1`. A buffer queued for
/// playback is always already at the target device's sample rate.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Interleaved audio samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Number of audio channels (typically 1 for mono)
    pub channels: usize,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    /// Playback duration at this buffer's sample rate.
    pub fn duration(&self) -> std::time::Duration {
        if self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }
}

//! WAV decoding and sample normalization for synthesis responses.

use std::io::Cursor;

use crate::audio::AudioBuffer;
use crate::error::{EngineError, EngineResult};

/// Decode a WAV byte stream into an [`AudioBuffer`] normalized to
/// [-1.0, 1.0].
///
/// Integer PCM is divided by the format's maximum magnitude. Float PCM is
/// divided by its peak magnitude only when the peak exceeds 1.0, so
/// already-normalized audio passes through untouched.
pub fn decode_wav(bytes: &[u8]) -> EngineResult<AudioBuffer> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => match spec.bits_per_sample {
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| f32::from(v) / f32::from(i16::MAX)))
                .collect::<Result<_, _>>()?,
            // hound widens 24-bit samples into i32.
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / ((1 << 23) - 1) as f32))
                .collect::<Result<_, _>>()?,
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / i32::MAX as f32))
                .collect::<Result<_, _>>()?,
            bits => {
                return Err(EngineError::UnsupportedWavFormat(format!(
                    "unsupported bit depth: {bits}"
                )));
            }
        },
        hound::SampleFormat::Float => {
            let raw: Vec<f32> = reader.samples::<f32>().collect::<Result<_, _>>()?;
            let peak = raw.iter().fold(0.0f32, |acc, &v| acc.max(v.abs()));
            if peak > 1.0 {
                raw.iter().map(|&v| v / peak).collect()
            } else {
                raw
            }
        }
    };

    Ok(AudioBuffer {
        samples,
        channels: spec.channels as usize,
        sample_rate: spec.sample_rate,
    })
}

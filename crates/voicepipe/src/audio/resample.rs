//! Sample-rate conversion for decoded synthesis audio.

use log::warn;
use rubato::{FftFixedIn, Resampler};

/// Frames fed to the FFT resampler per chunk.
const CHUNK_FRAMES: usize = 1024;

/// Inputs shorter than this go straight to the linear fallback; an FFT
/// window brings nothing at these sizes.
const MIN_FFT_FRAMES: usize = 64;

/// Resample interleaved audio from `from_rate` to `to_rate`.
///
/// Stateless: each call builds and discards its resampler. Equal rates
/// return the input unchanged. Uses FFT-based conversion, falling back to
/// linear interpolation for very short inputs or resampler failures. The
/// output is trimmed or zero-padded to exactly
/// `round(frames * to_rate / from_rate)` frames.
pub fn resample(samples: &[f32], channels: usize, from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let channels = channels.max(1);
    let frames = samples.len() / channels;
    let expected =
        ((frames as u64 * u64::from(to_rate) + u64::from(from_rate) / 2) / u64::from(from_rate)) as usize;

    if frames < MIN_FFT_FRAMES {
        return resample_linear(samples, channels, from_rate, to_rate);
    }

    let planar = deinterleave(samples, channels);
    match fft_resample(&planar, from_rate, to_rate) {
        Ok(mut resampled) => {
            for channel in &mut resampled {
                channel.resize(expected, 0.0);
            }
            interleave(&resampled)
        }
        Err(message) => {
            warn!("FFT resampling failed ({message}), using linear interpolation");
            resample_linear(samples, channels, from_rate, to_rate)
        }
    }
}

fn fft_resample(input: &[Vec<f32>], from_rate: u32, to_rate: u32) -> Result<Vec<Vec<f32>>, String> {
    let channels = input.len();
    let frames = input[0].len();

    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_FRAMES, 2, channels)
            .map_err(|e| e.to_string())?;

    let mut output: Vec<Vec<f32>> = vec![Vec::new(); channels];
    let mut pos = 0;

    loop {
        let needed = resampler.input_frames_next();
        if frames - pos >= needed {
            let chunk: Vec<&[f32]> = input.iter().map(|c| &c[pos..pos + needed]).collect();
            let processed = resampler.process(&chunk, None).map_err(|e| e.to_string())?;
            append_planar(&mut output, processed);
            pos += needed;
        } else {
            if pos < frames {
                let chunk: Vec<&[f32]> = input.iter().map(|c| &c[pos..]).collect();
                let processed = resampler
                    .process_partial(Some(&chunk), None)
                    .map_err(|e| e.to_string())?;
                append_planar(&mut output, processed);
            }
            // flush whatever the resampler still buffers internally
            let tail = resampler
                .process_partial::<&[f32]>(None, None)
                .map_err(|e| e.to_string())?;
            append_planar(&mut output, tail);
            break;
        }
    }

    Ok(output)
}

fn append_planar(output: &mut [Vec<f32>], processed: Vec<Vec<f32>>) {
    for (channel, chunk) in output.iter_mut().zip(processed) {
        channel.extend(chunk);
    }
}

/// Linear-interpolation fallback, operating directly on interleaved frames.
fn resample_linear(samples: &[f32], channels: usize, from_rate: u32, to_rate: u32) -> Vec<f32> {
    let frame_count = samples.len() / channels;
    if frame_count == 0 {
        return Vec::new();
    }

    let ratio = from_rate as f32 / to_rate as f32;
    let target_frames = ((frame_count as u64 * u64::from(to_rate) + u64::from(from_rate) / 2)
        / u64::from(from_rate)) as usize;
    let mut out = Vec::with_capacity(target_frames * channels);

    for i in 0..target_frames {
        let src_pos = i as f32 * ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = src_pos - src_idx as f32;

        for ch in 0..channels {
            let base = src_idx * channels + ch;
            let next = base + channels;

            let sample = if next < samples.len() {
                samples[base] * (1.0 - frac) + samples[next] * frac
            } else if base < samples.len() {
                samples[base]
            } else {
                0.0
            };
            out.push(sample);
        }
    }

    out
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            planar[ch].push(sample);
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let channels = planar.len();
    let frames = planar.first().map_or(0, Vec::len);
    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        for channel in planar {
            samples.push(channel[i]);
        }
    }
    samples
}

//! Playback worker: drains the audio queue onto the output device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use log::{debug, error, info, warn};

use crate::audio::device::DeviceSelector;
use crate::audio::resample::resample;
use crate::audio::AudioBuffer;
use crate::controls::PlaybackControls;
use crate::error::{EngineError, EngineResult};
use crate::queue::{Job, TaskQueue};

/// How often the wait loop re-checks the interrupt epoch.
const PROGRESS_POLL: Duration = Duration::from_millis(50);

/// Slack added to a clip's nominal duration before the wait loop gives up
/// on a stalled stream.
const DEADLINE_MARGIN: Duration = Duration::from_secs(2);

/// Background thread that plays queued [`AudioBuffer`]s in order.
///
/// One clip at a time: the worker blocks on the queue, resolves the output
/// device per clip (so replugging a headset takes effect on the next one),
/// plays it to completion or interruption, then acknowledges the item.
pub struct PlaybackWorker;

impl PlaybackWorker {
    pub fn spawn(
        queue: Arc<TaskQueue<AudioBuffer>>,
        controls: Arc<PlaybackControls>,
        selector: Arc<DeviceSelector>,
    ) -> JoinHandle<()> {
        thread::Builder::new()
            .name("voicepipe-playback".to_string())
            .spawn(move || run(&queue, &controls, &selector))
            .expect("failed to spawn playback thread")
    }
}

fn run(
    queue: &TaskQueue<AudioBuffer>,
    controls: &PlaybackControls,
    selector: &DeviceSelector,
) {
    debug!("playback worker started");
    loop {
        match queue.pop() {
            Job::Task(buffer) => {
                if let Err(err) = play_buffer(&buffer, controls, selector) {
                    error!("playback failed: {err}");
                }
                queue.task_done();
            }
            Job::Stop => break,
        }
    }
    debug!("playback worker stopped");
}

/// Progress shared between the audio callback and the wait loop.
struct CursorState {
    /// Next sample index to hand to the device.
    position: Mutex<usize>,
    advanced: Condvar,
    failed: AtomicBool,
}

/// Play one clip to completion, early interruption, or timeout.
fn play_buffer(
    buffer: &AudioBuffer,
    controls: &PlaybackControls,
    selector: &DeviceSelector,
) -> EngineResult<()> {
    if buffer.samples.is_empty() {
        return Ok(());
    }

    let output = selector.resolve()?;
    let supported = output.device.default_output_config()?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.config();
    let device_rate = config.sample_rate.0;
    let device_channels = config.channels as usize;

    debug!(
        "playing {:.2}s clip on \"{}\" ({device_rate} Hz, {device_channels} ch)",
        buffer.duration().as_secs_f64(),
        output.name
    );

    // Buffers are resampled at synthesis time, but the device (or its
    // configuration) may have changed since then.
    let samples = if buffer.sample_rate != device_rate {
        warn!(
            "device rate changed ({} Hz -> {device_rate} Hz), resampling clip",
            buffer.sample_rate
        );
        resample(&buffer.samples, buffer.channels, buffer.sample_rate, device_rate)
    } else {
        buffer.samples.clone()
    };
    let rendered = Arc::new(remap_channels(&samples, buffer.channels, device_channels));
    let total = rendered.len();

    let cursor = Arc::new(CursorState {
        position: Mutex::new(0),
        advanced: Condvar::new(),
        failed: AtomicBool::new(false),
    });
    let start_epoch = controls.epoch();

    let stream = build_stream(
        &output.device,
        &config,
        sample_format,
        Arc::clone(&rendered),
        Arc::clone(&cursor),
        controls.volume(),
    )?;
    stream.play()?;

    let duration = Duration::from_secs_f64(total as f64 / device_channels as f64 / f64::from(device_rate));
    let deadline = Instant::now() + duration + DEADLINE_MARGIN;

    let mut position = cursor
        .position
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    loop {
        if *position >= total {
            break;
        }
        if cursor.failed.load(Ordering::Acquire) {
            return Err(EngineError::Stream("output stream failed mid-clip".to_string()));
        }
        if controls.epoch() != start_epoch {
            info!("playback interrupted");
            break;
        }
        if Instant::now() >= deadline {
            warn!("playback stalled, abandoning clip");
            break;
        }
        let (guard, _) = cursor
            .advanced
            .wait_timeout(position, PROGRESS_POLL)
            .unwrap_or_else(PoisonError::into_inner);
        position = guard;
    }
    drop(position);

    // Dropping the stream stops the device callback.
    drop(stream);
    Ok(())
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    rendered: Arc<Vec<f32>>,
    cursor: Arc<CursorState>,
    volume: f32,
) -> EngineResult<cpal::Stream> {
    let err_cursor = Arc::clone(&cursor);
    let err_fn = move |err: cpal::StreamError| {
        error!("audio stream error: {err}");
        err_cursor.failed.store(true, Ordering::Release);
        err_cursor.advanced.notify_all();
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_output_stream(
            config,
            move |data: &mut [f32], _| {
                fill_frames(data, &rendered, &cursor, volume, |s| s);
            },
            err_fn,
            None,
        )?,
        cpal::SampleFormat::I16 => device.build_output_stream(
            config,
            move |data: &mut [i16], _| {
                fill_frames(data, &rendered, &cursor, volume, |s| {
                    (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
                });
            },
            err_fn,
            None,
        )?,
        other => return Err(EngineError::UnsupportedSampleFormat(other)),
    };
    Ok(stream)
}

/// Copy the next slice of rendered samples into the device buffer, padding
/// with silence past the end.
fn fill_frames<S: Copy>(
    data: &mut [S],
    rendered: &[f32],
    cursor: &CursorState,
    volume: f32,
    convert: impl Fn(f32) -> S,
) {
    let mut position = cursor
        .position
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let start = *position;
    for (i, slot) in data.iter_mut().enumerate() {
        let sample = rendered.get(start + i).copied().unwrap_or(0.0);
        *slot = convert(sample * volume);
    }
    *position = (start + data.len()).min(rendered.len());
    drop(position);
    cursor.advanced.notify_all();
}

/// Remap interleaved samples from `in_channels` to `out_channels` per
/// frame. Mono is duplicated across outputs; extra output channels repeat
/// the last input channel; extra input channels are dropped.
fn remap_channels(samples: &[f32], in_channels: usize, out_channels: usize) -> Vec<f32> {
    let in_channels = in_channels.max(1);
    if in_channels == out_channels {
        return samples.to_vec();
    }
    let frames = samples.len() / in_channels;
    let mut out = Vec::with_capacity(frames * out_channels);
    for frame in samples.chunks_exact(in_channels) {
        for ch in 0..out_channels {
            out.push(frame[ch.min(in_channels - 1)]);
        }
    }
    out
}

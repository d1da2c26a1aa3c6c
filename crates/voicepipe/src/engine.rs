//! The narration engine: public entry point for the whole pipeline.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};

use crate::audio::device::{DeviceSelector, SampleRateSource};
use crate::audio::playback::PlaybackWorker;
use crate::audio::AudioBuffer;
use crate::config::EngineConfig;
use crate::controls::PlaybackControls;
use crate::queue::TaskQueue;
use crate::synth::{SynthesisContext, SynthesisWorker};
use crate::text::{clean_for_speech, join_short_chunks, split_text};

/// How long the availability probe waits for a TCP connect.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-call options for [`SpeechEngine::speak`].
#[derive(Debug, Clone, Copy)]
pub struct SpeakOptions {
    /// Wait until the narration has fully played before returning.
    pub block: bool,
    /// Cut off any current narration before queueing this one.
    pub interrupt: bool,
    /// Strip markdown, code blocks, and other non-speech artifacts first.
    pub clean: bool,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            block: false,
            interrupt: true,
            clean: true,
        }
    }
}

struct Workers {
    synthesis: JoinHandle<()>,
    playback: JoinHandle<()>,
}

/// Streamed text-to-speech narration.
///
/// Owns the full pipeline: text is cleaned and segmented on the caller's
/// thread, synthesized on a background thread, and played on another. Both
/// workers are spawned lazily on the first [`speak`](Self::speak) and
/// reused across calls; they shut down when the engine is dropped.
///
/// The engine is `Send + Sync` — wrap it in an `Arc` to share it.
pub struct SpeechEngine {
    config: EngineConfig,
    controls: Arc<PlaybackControls>,
    requests: Arc<TaskQueue<String>>,
    audio: Arc<TaskQueue<AudioBuffer>>,
    selector: Arc<DeviceSelector>,
    workers: Mutex<Option<Workers>>,
    /// Cached result of the server availability probe.
    available: Mutex<Option<bool>>,
}

impl SpeechEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            controls: Arc::new(PlaybackControls::new()),
            requests: Arc::new(TaskQueue::new()),
            audio: Arc::new(TaskQueue::new()),
            selector: Arc::new(DeviceSelector::new()),
            workers: Mutex::new(None),
            available: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Narrate `text`.
    ///
    /// The text is cleaned (unless disabled), segmented into
    /// speakable chunks, and queued for synthesis. With
    /// `options.interrupt` set (the default), any narration already
    /// playing or queued is cancelled first. With `options.block` set,
    /// the call returns only after the last chunk has finished playing.
    ///
    /// Empty input, and input that cleans down to nothing, is a no-op.
    pub fn speak(&self, text: &str, options: SpeakOptions) {
        let cleaned = if options.clean {
            clean_for_speech(text)
        } else {
            text.trim().to_string()
        };
        if cleaned.is_empty() {
            debug!("nothing speakable in input, skipping");
            return;
        }

        if options.interrupt {
            self.stop();
        }
        self.ensure_workers();

        let chunks = self.prepare_chunks(&cleaned);
        debug!("queued {} chunks for synthesis", chunks.len());
        for chunk in chunks {
            self.requests.push_task(chunk);
        }

        if options.block {
            self.requests.join();
            self.audio.join();
        }
    }

    /// Stop all narration: interrupt the clip being played and drop
    /// everything still queued. Safe to call at any time, including before
    /// the first `speak`.
    pub fn stop(&self) {
        info!("stopping playback");
        self.controls.interrupt_playback();
        self.requests.clear();
        self.audio.clear();
    }

    /// Current playback volume in [0.0, 1.0].
    pub fn volume(&self) -> f32 {
        self.controls.volume()
    }

    /// Set playback volume; out-of-range values are clamped to [0.0, 1.0].
    /// Applies from the next clip onward.
    pub fn set_volume(&self, volume: f32) {
        self.controls.set_volume(volume);
    }

    /// Current speaking speed in [0.5, 2.0].
    pub fn speed(&self) -> f32 {
        self.controls.speed()
    }

    /// Set speaking speed; out-of-range values are clamped to [0.5, 2.0].
    /// Applies to chunks not yet synthesized.
    pub fn set_speed(&self, speed: f32) {
        self.controls.set_speed(speed);
    }

    /// Whether the synthesis server is reachable.
    ///
    /// The first call probes the server with a short TCP connect and
    /// caches the verdict; use [`reprobe`](Self::reprobe) after starting
    /// or stopping the server.
    pub fn is_available(&self) -> bool {
        let mut cached = self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cached.get_or_insert_with(|| probe_server(&self.config))
    }

    /// Drop the cached availability verdict and probe the server again.
    pub fn reprobe(&self) -> bool {
        let verdict = probe_server(&self.config);
        *self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(verdict);
        verdict
    }

    /// Segment cleaned text, merge short chunks, and apply the configured
    /// pronunciation replacements.
    fn prepare_chunks(&self, cleaned: &str) -> Vec<String> {
        let chunks = split_text(cleaned);
        let chunks = join_short_chunks(
            &chunks,
            self.config.min_chunk_len,
            self.config.max_chunk_len,
        );

        chunks
            .into_iter()
            .map(|mut chunk| {
                for (from, to) in &self.config.replacements {
                    chunk = chunk.replace(from.as_str(), to.as_str());
                }
                chunk.trim().to_string()
            })
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }

    /// Spawn the worker threads if they are not already running.
    fn ensure_workers(&self) {
        let mut workers = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let alive = workers
            .as_ref()
            .is_some_and(|w| !w.synthesis.is_finished() && !w.playback.is_finished());
        if alive {
            return;
        }
        if workers.is_some() {
            warn!("worker thread died, respawning pipeline");
        }

        let synthesis = SynthesisWorker::spawn(SynthesisContext {
            config: self.config.clone(),
            requests: Arc::clone(&self.requests),
            audio: Arc::clone(&self.audio),
            controls: Arc::clone(&self.controls),
            rates: Arc::clone(&self.selector) as Arc<dyn SampleRateSource>,
        });
        let playback = PlaybackWorker::spawn(
            Arc::clone(&self.audio),
            Arc::clone(&self.controls),
            Arc::clone(&self.selector),
        );
        *workers = Some(Workers { synthesis, playback });
    }
}

impl Drop for SpeechEngine {
    fn drop(&mut self) {
        let workers = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(workers) = workers else {
            return;
        };

        // Unblock both workers: clear pending work, abort the current
        // clip, and queue shutdown sentinels behind anything in flight.
        self.controls.interrupt_playback();
        self.requests.clear();
        self.audio.clear();
        self.requests.push_stop();
        self.audio.push_stop();

        let _ = workers.synthesis.join();
        let _ = workers.playback.join();
    }
}

/// TCP-level reachability check against the synthesis server.
fn probe_server(config: &EngineConfig) -> bool {
    let addr = config.probe_addr();
    let Ok(mut candidates) = addr.to_socket_addrs() else {
        warn!("cannot resolve synthesis server address {addr}");
        return false;
    };
    let Some(target) = candidates.next() else {
        warn!("no addresses resolved for synthesis server {addr}");
        return false;
    };
    match TcpStream::connect_timeout(&target, PROBE_TIMEOUT) {
        Ok(_) => {
            debug!("synthesis server reachable at {addr}");
            true
        }
        Err(err) => {
            info!("synthesis server not reachable at {addr}: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Config pointing at a port nothing listens on, with a short timeout.
    fn offline_config() -> EngineConfig {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        EngineConfig {
            host: "127.0.0.1".to_string(),
            port,
            request_timeout_secs: 1,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_empty_input_is_noop() {
        let engine = SpeechEngine::new(offline_config());
        engine.speak("", SpeakOptions::default());
        engine.speak("   \n\t ", SpeakOptions::default());
        // Nothing queued, no workers spawned.
        assert!(engine.requests.is_empty());
        assert!(engine.workers.lock().unwrap().is_none());
    }

    #[test]
    fn test_input_that_cleans_to_nothing_is_noop() {
        let engine = SpeechEngine::new(offline_config());
        engine.speak("<thinking>internal monologue</thinking>", SpeakOptions::default());
        assert!(engine.requests.is_empty());
        assert!(engine.workers.lock().unwrap().is_none());
    }

    #[test]
    fn test_stop_empties_queues() {
        let engine = SpeechEngine::new(offline_config());
        engine.requests.push_task("queued".to_string());
        engine.audio.push_task(AudioBuffer {
            samples: vec![0.0; 100],
            channels: 1,
            sample_rate: 24_000,
        });

        let epoch_before = engine.controls.epoch();
        engine.stop();
        assert!(engine.requests.is_empty());
        assert!(engine.audio.is_empty());
        assert_eq!(engine.controls.epoch(), epoch_before + 1);
    }

    #[test]
    fn test_volume_and_speed_clamp_through_engine() {
        let engine = SpeechEngine::new(offline_config());
        engine.set_volume(2.5);
        assert_eq!(engine.volume(), 1.0);
        engine.set_speed(0.01);
        assert_eq!(engine.speed(), 0.5);
    }

    #[test]
    fn test_blocking_speak_returns_when_server_is_down() {
        // Every chunk fails fast with a connection error; the request
        // queue must still settle so the blocking call returns.
        let engine = SpeechEngine::new(offline_config());
        engine.speak(
            "This narration will never be heard.",
            SpeakOptions {
                block: true,
                ..SpeakOptions::default()
            },
        );
        assert_eq!(engine.requests.unfinished(), 0);
        assert!(engine.audio.is_empty());
    }

    #[test]
    fn test_replacements_apply_before_queueing() {
        let engine = SpeechEngine::new(EngineConfig {
            replacements: vec![("sqlite".to_string(), "ess que ell ite".to_string())],
            ..offline_config()
        });
        let chunks = engine.prepare_chunks("sqlite is a database.");
        assert_eq!(chunks, vec!["ess que ell ite is a database.".to_string()]);
    }

    #[test]
    fn test_prepare_chunks_merges_short_sentences() {
        let engine = SpeechEngine::new(offline_config());
        let chunks = engine.prepare_chunks("One. Two. Three.");
        assert_eq!(chunks, vec!["One. Two. Three.".to_string()]);
    }

    #[test]
    fn test_availability_probe_is_cached() {
        let engine = SpeechEngine::new(offline_config());
        assert!(!engine.is_available());
        assert_eq!(*engine.available.lock().unwrap(), Some(false));

        // Flip the cache by hand: is_available must trust it, reprobe
        // must overwrite it.
        *engine.available.lock().unwrap() = Some(true);
        assert!(engine.is_available());
        assert!(!engine.reprobe());
        assert!(!engine.is_available());
    }

    #[test]
    fn test_availability_probe_finds_listening_server() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let engine = SpeechEngine::new(EngineConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..EngineConfig::default()
        });
        assert!(engine.is_available());
    }

    #[test]
    fn test_drop_shuts_down_workers() {
        let engine = SpeechEngine::new(offline_config());
        engine.speak(
            "Short.",
            SpeakOptions {
                block: true,
                ..SpeakOptions::default()
            },
        );
        // Drop must join both threads without hanging.
        drop(engine);
    }
}

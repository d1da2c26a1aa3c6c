//! Synthesis worker: turns queued text chunks into playable audio.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error};
use reqwest::blocking::Client;

use crate::audio::decode::decode_wav;
use crate::audio::device::SampleRateSource;
use crate::audio::resample::resample;
use crate::audio::AudioBuffer;
use crate::config::{EngineConfig, VOICE_ENV};
use crate::controls::PlaybackControls;
use crate::error::{EngineError, EngineResult};
use crate::queue::{Job, TaskQueue};

/// Everything the synthesis thread needs, bundled so the spawn call stays
/// readable.
pub struct SynthesisContext {
    pub config: EngineConfig,
    pub requests: Arc<TaskQueue<String>>,
    pub audio: Arc<TaskQueue<AudioBuffer>>,
    pub controls: Arc<PlaybackControls>,
    pub rates: Arc<dyn SampleRateSource>,
}

/// Background thread that sends text chunks to the synthesis server and
/// queues the decoded audio for playback.
///
/// Chunks are processed strictly one at a time, which is what keeps the
/// audio queue in utterance order. A failed chunk is logged and skipped;
/// the rest of the narration continues.
pub struct SynthesisWorker;

impl SynthesisWorker {
    pub fn spawn(context: SynthesisContext) -> JoinHandle<()> {
        thread::Builder::new()
            .name("voicepipe-synthesis".to_string())
            .spawn(move || run(context))
            .expect("failed to spawn synthesis thread")
    }
}

fn run(context: SynthesisContext) {
    debug!("synthesis worker started");
    let client = Client::builder()
        .timeout(Duration::from_secs(context.config.request_timeout_secs))
        .build()
        .unwrap_or_else(|_| Client::new());

    loop {
        match context.requests.pop() {
            Job::Task(chunk) => {
                let epoch = context.controls.epoch();
                match synthesize_chunk(&client, &context, &chunk) {
                    // An interrupt that lands while the request is in
                    // flight makes the result stale; queueing it would
                    // replay cancelled narration.
                    Ok(buffer) if context.controls.epoch() == epoch => {
                        context.audio.push_task(buffer);
                    }
                    Ok(_) => debug!("discarding audio synthesized before interrupt"),
                    Err(err) => error!("synthesis failed for chunk: {err}"),
                }
                context.requests.task_done();
            }
            Job::Stop => break,
        }
    }
    debug!("synthesis worker stopped");
}

/// Request one chunk from the server and prepare it for the output device.
fn synthesize_chunk(
    client: &Client,
    context: &SynthesisContext,
    chunk: &str,
) -> EngineResult<AudioBuffer> {
    let speed = context.controls.speed();
    debug!("synthesizing {} chars at {speed:.2}x", chunk.len());

    let mut query: Vec<(&str, String)> = vec![
        ("text", chunk.to_string()),
        ("speed", format!("{speed}")),
    ];
    let voice = context
        .config
        .voice
        .clone()
        .or_else(|| std::env::var(VOICE_ENV).ok());
    if let Some(voice) = voice {
        query.push(("voice", voice));
    }

    let response = client
        .get(context.config.synthesis_url())
        .query(&query)
        .send()?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(EngineError::ServerStatus {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes()?;
    let buffer = decode_wav(&bytes)?;

    let device_rate = context.rates.device_sample_rate()?;
    if buffer.sample_rate == device_rate {
        return Ok(buffer);
    }
    debug!(
        "resampling {} Hz -> {device_rate} Hz",
        buffer.sample_rate
    );
    let samples = resample(&buffer.samples, buffer.channels, buffer.sample_rate, device_rate);
    Ok(AudioBuffer {
        samples,
        channels: buffer.channels,
        sample_rate: device_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::io::Cursor;

    struct FixedRate(u32);

    impl SampleRateSource for FixedRate {
        fn device_sample_rate(&self) -> EngineResult<u32> {
            Ok(self.0)
        }
    }

    fn wav_response(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn context_for(server: &MockServer, device_rate: u32) -> SynthesisContext {
        let config = EngineConfig {
            host: server.host(),
            port: server.port(),
            request_timeout_secs: 5,
            ..EngineConfig::default()
        };
        SynthesisContext {
            config,
            requests: Arc::new(TaskQueue::new()),
            audio: Arc::new(TaskQueue::new()),
            controls: Arc::new(PlaybackControls::new()),
            rates: Arc::new(FixedRate(device_rate)),
        }
    }

    #[test]
    fn test_worker_preserves_chunk_order() {
        // Each chunk gets a response of a different length, so a swap in
        // the output order cannot go unnoticed.
        let server = MockServer::start();
        let chunks = ["First sentence.", "Second sentence.", "Third sentence."];
        for (i, text) in chunks.iter().enumerate() {
            let body = wav_response(24_000, &vec![1000; 240 * (i + 1)]);
            server.mock(move |when, then| {
                when.method(GET).path("/tts").query_param("text", *text);
                then.status(200).body(body);
            });
        }

        let context = context_for(&server, 24_000);
        let requests = Arc::clone(&context.requests);
        let audio = Arc::clone(&context.audio);

        let handle = SynthesisWorker::spawn(context);
        for text in chunks {
            requests.push_task(text.to_string());
        }
        requests.join();
        requests.push_stop();
        handle.join().unwrap();

        assert_eq!(requests.unfinished(), 0);
        assert_eq!(audio.unfinished(), 3);
        for expected_len in [240, 480, 720] {
            match audio.pop() {
                Job::Task(buffer) => assert_eq!(buffer.samples.len(), expected_len),
                Job::Stop => panic!("expected audio, got stop sentinel"),
            }
        }
    }

    #[test]
    fn test_worker_discards_result_synthesized_before_interrupt() {
        let server = MockServer::start();
        let body = wav_response(24_000, &[1000; 240]);
        server.mock(|when, then| {
            when.method(GET).path("/tts");
            then.status(200)
                .body(body.clone())
                .delay(Duration::from_millis(300));
        });

        let context = context_for(&server, 24_000);
        let requests = Arc::clone(&context.requests);
        let audio = Arc::clone(&context.audio);
        let controls = Arc::clone(&context.controls);

        let handle = SynthesisWorker::spawn(context);
        requests.push_task("cancelled mid-request".to_string());
        // Let the request get in flight, then interrupt before it returns.
        std::thread::sleep(Duration::from_millis(100));
        controls.interrupt_playback();
        requests.join();
        requests.push_stop();
        handle.join().unwrap();

        // The response arrived after the interrupt, so nothing may reach
        // the audio queue, but the request accounting still settles.
        assert!(audio.is_empty());
        assert_eq!(requests.unfinished(), 0);
    }

    #[test]
    fn test_worker_resamples_to_device_rate() {
        let server = MockServer::start();
        let body = wav_response(24_000, &[500; 2400]);
        server.mock(|when, then| {
            when.method(GET).path("/tts");
            then.status(200).body(body.clone());
        });

        let context = context_for(&server, 48_000);
        let requests = Arc::clone(&context.requests);
        let audio = Arc::clone(&context.audio);

        let handle = SynthesisWorker::spawn(context);
        requests.push_task("Hello there.".to_string());
        requests.join();
        requests.push_stop();
        handle.join().unwrap();

        match audio.pop() {
            Job::Task(buffer) => {
                assert_eq!(buffer.sample_rate, 48_000);
                assert_eq!(buffer.samples.len(), 4800);
            }
            Job::Stop => panic!("expected audio, got stop sentinel"),
        }
    }

    #[test]
    fn test_worker_skips_failed_chunks() {
        let server = MockServer::start();
        let ok_body = wav_response(24_000, &[100; 240]);
        server.mock(|when, then| {
            when.method(GET).path("/tts").query_param("text", "good");
            then.status(200).body(ok_body.clone());
        });
        server.mock(|when, then| {
            when.method(GET).path("/tts").query_param("text", "bad");
            then.status(500).body("synthesis exploded");
        });

        let context = context_for(&server, 24_000);
        let requests = Arc::clone(&context.requests);
        let audio = Arc::clone(&context.audio);

        let handle = SynthesisWorker::spawn(context);
        requests.push_task("bad".to_string());
        requests.push_task("good".to_string());
        requests.join();
        requests.push_stop();
        handle.join().unwrap();

        // The failed chunk is dropped, the good one still comes through,
        // and the request accounting is settled either way.
        assert_eq!(audio.len(), 1);
        assert_eq!(requests.unfinished(), 0);
    }

    #[test]
    fn test_worker_passes_speed_and_voice() {
        let server = MockServer::start();
        let body = wav_response(24_000, &[100; 240]);
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/tts")
                .query_param("speed", "1.5")
                .query_param("voice", "alba");
            then.status(200).body(body.clone());
        });

        let mut context = context_for(&server, 24_000);
        context.config.voice = Some("alba".to_string());
        context.controls.set_speed(1.5);
        let requests = Arc::clone(&context.requests);

        let handle = SynthesisWorker::spawn(context);
        requests.push_task("Hi.".to_string());
        requests.join();
        requests.push_stop();
        handle.join().unwrap();

        mock.assert();
    }

    #[test]
    fn test_worker_reports_unreachable_server() {
        // Grab a free port, then release it so nothing is listening there.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = EngineConfig {
            host: "127.0.0.1".to_string(),
            port,
            request_timeout_secs: 1,
            ..EngineConfig::default()
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        let context = SynthesisContext {
            config,
            requests: Arc::new(TaskQueue::new()),
            audio: Arc::new(TaskQueue::new()),
            controls: Arc::new(PlaybackControls::new()),
            rates: Arc::new(FixedRate(24_000)),
        };
        let result = synthesize_chunk(&client, &context, "anyone home?");
        assert!(matches!(result, Err(EngineError::Http(_))));
    }
}

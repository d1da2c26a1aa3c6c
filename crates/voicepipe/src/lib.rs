//! Streamed text-to-speech narration.
//!
//! voicepipe turns assistant output into spoken audio through a local
//! synthesis server. Text is cleaned of markdown and code artifacts,
//! segmented into speakable chunks, synthesized over HTTP, and played on
//! the system's output device, with synthesis of the next chunk
//! overlapping playback of the current one.
//!
//! ```no_run
//! use voicepipe::{EngineConfig, SpeakOptions, SpeechEngine};
//!
//! let engine = SpeechEngine::new(EngineConfig::default());
//! if engine.is_available() {
//!     engine.speak("Hello! This is **streamed** narration.", SpeakOptions::default());
//! }
//! ```

pub mod audio;
pub mod config;
pub mod controls;
pub mod engine;
pub mod error;
pub mod queue;
pub mod synth;
pub mod text;

pub use audio::AudioBuffer;
pub use config::EngineConfig;
pub use engine::{SpeakOptions, SpeechEngine};
pub use error::{EngineError, EngineResult};
pub use text::{clean_for_speech, join_short_chunks, split_text};

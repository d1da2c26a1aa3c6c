use thiserror::Error;

/// Errors raised by the narration engine and its workers.
///
/// Per-item failures (an unreachable server, a bad WAV body, a vanished
/// output device) are logged and skipped by the worker loops; none of them
/// propagate to `speak` callers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no suitable audio output device found")]
    NoOutputDevice,
    #[error("failed to query output device configuration: {0}")]
    DefaultOutputConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build audio output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start audio output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("unsupported output sample format: {0:?}")]
    UnsupportedSampleFormat(cpal::SampleFormat),
    #[error("audio output stream reported an error: {0}")]
    Stream(String),
    #[error("synthesis request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("synthesis server returned status {status}: {body}")]
    ServerStatus { status: u16, body: String },
    #[error("failed to decode WAV response: {0}")]
    WavDecode(#[from] hound::Error),
    #[error("unsupported WAV format: {0}")]
    UnsupportedWavFormat(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

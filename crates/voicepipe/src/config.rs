//! Configuration for the narration engine

use serde::{Deserialize, Serialize};

/// Environment variable naming the voice passed through to the synthesis
/// server when [`EngineConfig::voice`] is unset.
pub const VOICE_ENV: &str = "VOICEPIPE_VOICE";

/// Environment variable holding an integer output-device index override,
/// consumed by the device selector.
pub const DEVICE_ENV: &str = "VOICEPIPE_DEVICE";

/// Configuration for a [`SpeechEngine`](crate::SpeechEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Synthesis server host (default: "localhost")
    #[serde(default = "default_host")]
    pub host: String,

    /// Synthesis server port (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Voice passed to the synthesis server. `None` falls back to the
    /// `VOICEPIPE_VOICE` environment variable at request time.
    #[serde(default)]
    pub voice: Option<String>,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Chunks shorter than this are merged with their neighbors (default: 100)
    #[serde(default = "default_min_chunk_len")]
    pub min_chunk_len: usize,

    /// Upper bound for merged chunk length (default: 300)
    #[serde(default = "default_max_chunk_len")]
    pub max_chunk_len: Option<usize>,

    /// Literal substring replacements applied to each chunk before
    /// synthesis, for words the server mispronounces.
    #[serde(default)]
    pub replacements: Vec<(String, String)>,
}

impl EngineConfig {
    /// URL of the synthesis endpoint.
    pub fn synthesis_url(&self) -> String {
        format!("http://{}:{}/tts", self.host, self.port)
    }

    /// Address probed to decide server availability.
    pub fn probe_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_min_chunk_len() -> usize {
    100
}

fn default_max_chunk_len() -> Option<usize> {
    Some(300)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            voice: None,
            request_timeout_secs: default_request_timeout(),
            min_chunk_len: default_min_chunk_len(),
            max_chunk_len: default_max_chunk_len(),
            replacements: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8000);
        assert_eq!(config.min_chunk_len, 100);
        assert_eq!(config.max_chunk_len, Some(300));
        assert_eq!(config.synthesis_url(), "http://localhost:8000/tts");
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig {
            voice: Some("alba".to_string()),
            replacements: vec![("sqlite".to_string(), "ess que ell ite".to_string())],
            ..EngineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.voice.as_deref(), Some("alba"));
        assert_eq!(deserialized.replacements.len(), 1);
        assert_eq!(deserialized.port, config.port);
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"port": 9123}"#).unwrap();
        assert_eq!(config.port, 9123);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.max_chunk_len, Some(300));
    }
}

use std::time::Duration;

use crate::audio::{AudioFormat, DEFAULT_CHUNK_SIZE};
use crate::config::Config;
use crate::recognizer::StreamConfig;
use crate::synthesis::VoiceConfig;

/// Slack added on top of adapter timeouts before the orchestrator gives up
const ADAPTER_GRACE: Duration = Duration::from_millis(500);

/// Configuration for one call session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Spoken when the call connects; `None` waits for the caller instead
    pub greeting_text: Option<String>,

    /// Delay between accept and the greeting turn
    /// Default: 1 second
    pub greeting_delay: Duration,

    /// Spoken when the dialog engine fails or has nothing to say
    pub fallback_text: String,

    /// Ping period on the caller's leg
    /// Default: 5 seconds
    pub heartbeat_interval: Duration,

    /// Bytes per paced playback chunk
    pub chunk_size: usize,

    /// Caller leg wire format (μ-law 8kHz mono for telephony)
    pub wire_format: AudioFormat,

    /// Recognizer stream parameters
    pub stream: StreamConfig,

    pub voice: VoiceConfig,

    /// Require `speech_final` when the recognizer reports it
    pub require_speech_final: bool,

    /// Treat a recognizer failure as fatal to the call
    pub recognizer_required: bool,

    /// Upper bound on one dialog exchange
    pub dialog_timeout: Duration,

    /// Upper bound on one synthesis request, including transcoding
    pub synthesis_timeout: Duration,
}

impl SessionConfig {
    pub fn from_config(cfg: &Config) -> Self {
        let settings = &cfg.session;
        let greeting_text = Some(settings.greeting_text.trim().to_string())
            .filter(|text| !text.is_empty());

        Self {
            greeting_text,
            greeting_delay: Duration::from_millis(settings.greeting_delay_ms),
            fallback_text: settings.fallback_text.clone(),
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms),
            chunk_size: settings.chunk_size,
            wire_format: cfg.transport.format(),
            stream: cfg.recognizer.stream_config(),
            voice: VoiceConfig {
                voice_id: cfg.synthesis.voice_id.clone(),
                model_id: cfg.synthesis.model_id.clone(),
                stability: cfg.synthesis.stability,
                similarity_boost: cfg.synthesis.similarity_boost,
            },
            require_speech_final: settings.require_speech_final,
            recognizer_required: settings.recognizer_required,
            dialog_timeout: Duration::from_millis(cfg.dialog.timeout_ms) + ADAPTER_GRACE,
            synthesis_timeout: Duration::from_millis(cfg.synthesis.timeout_ms) + ADAPTER_GRACE,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting_text: Some("Hello! How can I help you today?".to_string()),
            greeting_delay: Duration::from_secs(1),
            fallback_text: "Sorry, I didn't understand that. Please try again.".to_string(),
            heartbeat_interval: Duration::from_secs(5),
            chunk_size: DEFAULT_CHUNK_SIZE,
            wire_format: AudioFormat::TELEPHONY,
            stream: StreamConfig::default(),
            voice: VoiceConfig::default(),
            require_speech_final: true,
            recognizer_required: false,
            dialog_timeout: Duration::from_secs(10) + ADAPTER_GRACE,
            synthesis_timeout: Duration::from_secs(30) + ADAPTER_GRACE,
        }
    }
}

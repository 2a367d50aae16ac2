use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::{AudioEncoding, AudioFormat, DEFAULT_CHUNK_SIZE};
use crate::recognizer::StreamConfig;
use crate::transport::OutboundFraming;

/// Prefix for environment overrides, e.g. `CALLBRIDGE__SERVICE__HTTP__PORT`
const ENV_PREFIX: &str = "CALLBRIDGE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub transport: TransportConfig,
    pub recognizer: RecognizerConfig,
    pub dialog: DialogConfig,
    pub synthesis: SynthesisConfig,
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    /// Period of the active-session log line
    pub health_log_interval_secs: u64,
    /// How long shutdown waits for calls to drain before exiting
    pub shutdown_grace_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "callbridge".to_string(),
            http: HttpConfig::default(),
            health_log_interval_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Caller leg wire format
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub framing: OutboundFraming,
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub channels: u16,
}

impl TransportConfig {
    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            encoding: self.encoding,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            framing: OutboundFraming::Binary,
            encoding: AudioEncoding::Mulaw,
            sample_rate: 8000,
            channels: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerProvider {
    #[default]
    Deepgram,
    Nats,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub provider: RecognizerProvider,
    /// Deepgram listen endpoint
    pub url: String,
    pub api_key: String,
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub channels: u16,
    pub punctuate: bool,
    pub interim_results: bool,
    pub language: Option<String>,
    /// NATS server for the `nats` provider
    pub nats_url: String,
}

impl RecognizerConfig {
    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            encoding: self.encoding,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Stream parameters matching the configured audio format
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            format: self.format(),
            punctuate: self.punctuate,
            interim_results: self.interim_results,
            language: self.language.clone(),
        }
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            provider: RecognizerProvider::Deepgram,
            url: crate::recognizer::deepgram::DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            encoding: AudioEncoding::Mulaw,
            sample_rate: 8000,
            channels: 1,
            punctuate: true,
            interim_results: false,
            language: None,
            nats_url: "nats://localhost:4222".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    pub base_url: String,
    pub api_key: String,
    pub version_id: String,
    pub timeout_ms: u64,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            base_url: crate::dialog::voiceflow::DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            version_id: String::new(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub base_url: String,
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub timeout_ms: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            base_url: crate::synthesis::elevenlabs::DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            voice_id: String::new(),
            model_id: "eleven_monolingual_v1".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            timeout_ms: 30_000,
        }
    }
}

/// `[session]` section, turned into a `SessionConfig` per call
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub greeting_text: String,
    pub greeting_delay_ms: u64,
    pub fallback_text: String,
    pub heartbeat_interval_ms: u64,
    pub chunk_size: usize,
    pub require_speech_final: bool,
    /// Shut the call down when the recognizer cannot be reached
    pub recognizer_required: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            greeting_text: "Hello! How can I help you today?".to_string(),
            greeting_delay_ms: 1000,
            fallback_text: "Sorry, I didn't understand that. Please try again.".to_string(),
            heartbeat_interval_ms: 5000,
            chunk_size: DEFAULT_CHUNK_SIZE,
            require_speech_final: true,
            recognizer_required: false,
        }
    }
}

impl Config {
    /// Load `path` (extension optional) layered with `CALLBRIDGE__*` variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        let mut cfg: Config = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;
        cfg.apply_env_credentials();

        Ok(cfg)
    }

    /// Fill empty credentials from the conventional vendor variables
    pub fn apply_env_credentials(&mut self) {
        self.apply_credentials_from(|name| std::env::var(name).ok());
    }

    pub fn apply_credentials_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fill = |slot: &mut String, name: &str| {
            if slot.is_empty() {
                if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                    *slot = value;
                }
            }
        };

        fill(&mut self.recognizer.api_key, "DEEPGRAM_API_KEY");
        fill(&mut self.dialog.api_key, "VOICEFLOW_API_KEY");
        fill(&mut self.dialog.version_id, "VOICEFLOW_VERSION_ID");
        fill(&mut self.synthesis.api_key, "ELEVENLABS_API_KEY");
        fill(&mut self.synthesis.voice_id, "ELEVENLABS_VOICE_ID");

        // Hosting platforms hand the port over in PORT
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.service.http.port = port;
        }
    }

    /// Credential name → whether it is set, for startup logging
    pub fn credential_status(&self) -> Vec<(&'static str, bool)> {
        let mut status = vec![
            ("VOICEFLOW_API_KEY", !self.dialog.api_key.is_empty()),
            ("VOICEFLOW_VERSION_ID", !self.dialog.version_id.is_empty()),
            ("ELEVENLABS_API_KEY", !self.synthesis.api_key.is_empty()),
            ("ELEVENLABS_VOICE_ID", !self.synthesis.voice_id.is_empty()),
        ];
        if self.recognizer.provider == RecognizerProvider::Deepgram {
            status.insert(0, ("DEEPGRAM_API_KEY", !self.recognizer.api_key.is_empty()));
        }
        status
    }
}

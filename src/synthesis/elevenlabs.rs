use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use super::{SynthesisClient, VoiceConfig};
use crate::audio::{transcode, AudioFormat};
use crate::config::SynthesisConfig;
use crate::error::SynthesisError;

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// ElevenLabs streaming text-to-speech
///
/// The MP3 reply is transcoded to `output_format` on the blocking pool.
pub struct ElevenLabsClient {
    base_url: String,
    api_key: String,
    timeout: Duration,
    output_format: AudioFormat,
    client: reqwest::Client,
}

impl ElevenLabsClient {
    pub fn new(config: &SynthesisConfig, output_format: AudioFormat) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout,
            output_format,
            client,
        }
    }

    fn speech_url(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{}/stream", self.base_url, voice_id)
    }

    async fn fetch_mp3(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, SynthesisError> {
        let body = SpeechRequest {
            text,
            model_id: &voice.model_id,
            voice_settings: VoiceSettings {
                stability: voice.stability,
                similarity_boost: voice.similarity_boost,
            },
        };

        let response = self
            .client
            .post(self.speech_url(&voice.voice_id))
            .header("xi-api-key", self.api_key.as_str())
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(e))?;

        Ok(bytes.to_vec())
    }

    fn map_request_error(&self, e: reqwest::Error) -> SynthesisError {
        if e.is_timeout() {
            SynthesisError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            SynthesisError::Network(e.to_string())
        }
    }
}

#[async_trait::async_trait]
impl SynthesisClient for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, SynthesisError> {
        info!("Converting text to speech with voice {}", voice.voice_id);

        let mp3 = self.fetch_mp3(text, voice).await?;
        if mp3.is_empty() {
            return Err(SynthesisError::Empty);
        }
        debug!("Received MP3 audio ({} bytes)", mp3.len());

        let target = self.output_format;
        let wire = tokio::task::spawn_blocking(move || transcode::mp3_to_wire(mp3, target))
            .await
            .map_err(|e| SynthesisError::Transcode(format!("transcoder task failed: {}", e)))??;

        debug!("Transcoded to {} wire bytes", wire.len());
        Ok(wire)
    }
}

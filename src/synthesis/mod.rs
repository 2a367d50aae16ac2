//! Text → wire audio
//!
//! Implementations return raw samples already in the transport's wire format,
//! ready to hand to the pacer.

pub mod elevenlabs;

use serde::{Deserialize, Serialize};

use crate::error::SynthesisError;

pub use elevenlabs::ElevenLabsClient;

/// Voice selection passed through to the vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub voice_id: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_id: String::new(),
            model_id: "eleven_monolingual_v1".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

#[async_trait::async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Convert `text` to wire audio using `voice`
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, SynthesisError>;
}

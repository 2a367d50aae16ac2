//! Streaming speech recognition
//!
//! A session opens one `TranscriptionStream`, pushes caller audio into it and
//! receives `RecognizerEvent`s back on a channel. Providers:
//! - Deepgram live transcription over WebSocket
//! - a self-hosted STT service reached over NATS

pub mod deepgram;
pub mod messages;
pub mod nats;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::audio::{AudioFormat, AudioFrame};
use crate::config::{RecognizerConfig, RecognizerProvider};
use crate::error::RecognitionError;

pub use deepgram::DeepgramStream;
pub use messages::{AudioFrameMessage, TranscriptMessage};
pub use nats::NatsTranscriptionStream;

/// One recognizer result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    /// The recognizer will not revise this text any more
    pub is_final: bool,
    /// Secondary end-of-speech signal, when the recognizer exposes one
    pub speech_final: Option<bool>,
    pub confidence: Option<f32>,
}

impl TranscriptEvent {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            speech_final: None,
            confidence: None,
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            speech_final: Some(true),
            confidence: None,
        }
    }

    /// Whether this event ends an utterance
    ///
    /// With `require_speech_final`, a recognizer that reports `speech_final`
    /// must report it as true; recognizers that never report it fall back to
    /// `is_final` alone. Final segments that do not end the utterance are
    /// buffered by the session and joined with the one that does.
    pub fn ends_utterance(&self, require_speech_final: bool) -> bool {
        if !self.is_final {
            return false;
        }
        match (require_speech_final, self.speech_final) {
            (true, Some(speech_final)) => speech_final,
            _ => true,
        }
    }
}

/// Events surfaced by an open stream
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerEvent {
    Transcript(TranscriptEvent),
    /// Terminal failure; no further transcripts will arrive
    Error(String),
    /// Stream ended
    Closed,
}

/// Parameters for opening a stream
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Format of the audio that will be sent
    pub format: AudioFormat,
    pub punctuate: bool,
    pub interim_results: bool,
    /// Passed through to the provider untouched
    pub language: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::TELEPHONY,
            punctuate: true,
            interim_results: false,
            language: None,
        }
    }
}

/// Streaming speech-to-text connection
///
/// `send` after `close` (or after the provider dropped the connection) is a
/// no-op: inbound audio races with teardown and must never fail the caller.
#[async_trait::async_trait]
pub trait TranscriptionStream: Send + Sync {
    /// Connect and return the event channel
    async fn open(
        &mut self,
        config: &StreamConfig,
    ) -> Result<mpsc::Receiver<RecognizerEvent>, RecognitionError>;

    /// Push caller audio
    async fn send(&mut self, frame: &AudioFrame) -> Result<(), RecognitionError>;

    /// Close the connection; repeated calls are no-ops
    async fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Creates one stream per session
pub trait RecognizerFactory: Send + Sync {
    fn create(&self, session_id: &str) -> Box<dyn TranscriptionStream>;
}

/// Factory driven by the `[recognizer]` configuration section
pub struct ConfiguredRecognizerFactory {
    config: RecognizerConfig,
}

impl ConfiguredRecognizerFactory {
    pub fn new(config: RecognizerConfig) -> Self {
        Self { config }
    }
}

impl RecognizerFactory for ConfiguredRecognizerFactory {
    fn create(&self, session_id: &str) -> Box<dyn TranscriptionStream> {
        match self.config.provider {
            RecognizerProvider::Deepgram => Box::new(DeepgramStream::new(
                self.config.url.clone(),
                self.config.api_key.clone(),
            )),
            RecognizerProvider::Nats => Box::new(NatsTranscriptionStream::new(
                self.config.nats_url.clone(),
                session_id.to_string(),
            )),
        }
    }
}

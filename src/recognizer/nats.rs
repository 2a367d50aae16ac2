use async_nats::Client;
use base64::Engine;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::messages::{AudioFrameMessage, TranscriptMessage};
use super::{RecognizerEvent, StreamConfig, TranscriptEvent, TranscriptionStream};
use crate::audio::{AudioFormat, AudioFrame};
use crate::error::RecognitionError;

/// Subject the STT service publishes partial and final transcripts on
const TRANSCRIPT_SUBJECT: &str = "stt.text.>";

/// Recognizer reached through a NATS-connected STT service
///
/// Audio goes out on `audio.frame.call-<session>`; transcripts for every
/// session arrive on `stt.text.>` and are filtered by session id.
pub struct NatsTranscriptionStream {
    url: String,
    session_id: String,
    client: Option<Client>,
    format: AudioFormat,
    sequence: u32,
    listener_handle: Option<JoinHandle<()>>,
}

impl NatsTranscriptionStream {
    pub fn new(url: String, session_id: String) -> Self {
        Self {
            url,
            session_id,
            client: None,
            format: AudioFormat::TELEPHONY,
            sequence: 0,
            listener_handle: None,
        }
    }

    fn audio_subject(&self) -> String {
        format!("audio.frame.call-{}", self.session_id)
    }

    async fn publish_frame(&mut self, data: &[u8], is_final: bool) -> Result<(), RecognitionError> {
        let Some(client) = &self.client else {
            return Ok(());
        };

        let message = AudioFrameMessage {
            session_id: self.session_id.clone(),
            sequence: self.sequence,
            pcm: base64::engine::general_purpose::STANDARD.encode(data),
            encoding: self.format.encoding,
            sample_rate: self.format.sample_rate,
            channels: self.format.channels,
            timestamp: chrono::Utc::now().to_rfc3339(),
            final_frame: is_final,
        };

        let payload = serde_json::to_vec(&message)
            .map_err(|e| RecognitionError::Stream(e.to_string()))?;

        client
            .publish(self.audio_subject(), payload.into())
            .await
            .map_err(|e| RecognitionError::Stream(format!("Failed to publish audio frame: {}", e)))?;

        debug!(
            "Published audio frame (session={}, sequence={}, bytes={}, final={})",
            self.session_id,
            self.sequence,
            data.len(),
            is_final
        );

        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }
}

/// Convert a transcript message addressed to `session_id`
pub fn to_transcript_event(message: TranscriptMessage, session_id: &str) -> Option<TranscriptEvent> {
    if message.session_id != session_id {
        return None;
    }

    Some(TranscriptEvent {
        text: message.text,
        is_final: !message.partial,
        speech_final: message.speech_final,
        confidence: message.confidence,
    })
}

#[async_trait::async_trait]
impl TranscriptionStream for NatsTranscriptionStream {
    async fn open(
        &mut self,
        config: &StreamConfig,
    ) -> Result<mpsc::Receiver<RecognizerEvent>, RecognitionError> {
        info!("Connecting to NATS at {}", self.url);

        let client = async_nats::connect(self.url.as_str())
            .await
            .map_err(|e| RecognitionError::Connect(format!("Failed to connect to NATS: {}", e)))?;

        let mut subscriber = client
            .subscribe(TRANSCRIPT_SUBJECT.to_string())
            .await
            .map_err(|e| {
                RecognitionError::Connect(format!("Failed to subscribe to transcripts: {}", e))
            })?;

        info!("Subscribed to {}", TRANSCRIPT_SUBJECT);

        let (events_tx, events_rx) = mpsc::channel(64);
        let session_id = self.session_id.clone();

        let listener = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<TranscriptMessage>(&msg.payload) {
                    Ok(message) => {
                        let Some(event) = to_transcript_event(message, &session_id) else {
                            continue;
                        };
                        if events_tx.send(RecognizerEvent::Transcript(event)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse transcript message: {}", e);
                    }
                }
            }

            let _ = events_tx.send(RecognizerEvent::Closed).await;
        });

        self.client = Some(client);
        self.format = config.format;
        self.listener_handle = Some(listener);

        Ok(events_rx)
    }

    async fn send(&mut self, frame: &AudioFrame) -> Result<(), RecognitionError> {
        if self.client.is_none() {
            debug!("Dropping audio for closed NATS stream {}", self.session_id);
            return Ok(());
        }

        self.publish_frame(&frame.data, false).await
    }

    async fn close(&mut self) {
        if self.client.is_none() {
            return;
        }

        // Final frame marker tells the STT service to flush
        if let Err(e) = self.publish_frame(&[], true).await {
            warn!("Failed to publish final frame marker: {}", e);
        }

        if let Some(client) = self.client.take() {
            if let Err(e) = client.flush().await {
                debug!("NATS flush on close: {}", e);
            }
        }

        if let Some(listener) = self.listener_handle.take() {
            listener.abort();
        }

        info!("Closed NATS transcription stream {}", self.session_id);
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    fn name(&self) -> &str {
        "nats"
    }
}

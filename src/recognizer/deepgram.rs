use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{RecognizerEvent, StreamConfig, TranscriptEvent, TranscriptionStream};
use crate::audio::AudioFrame;
use crate::error::RecognitionError;

pub const DEFAULT_ENDPOINT: &str = "wss://api.deepgram.com/v1/listen";

const CLOSE_STREAM: &str = r#"{"type":"CloseStream"}"#;

#[derive(Debug, Deserialize)]
struct ResultsMessage {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    channel: Option<ResultsChannel>,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    speech_final: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ResultsChannel {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Parse a Deepgram live message into a transcript
///
/// Metadata, SpeechStarted and UtteranceEnd messages, and results with an
/// empty transcript, yield `None`.
pub fn parse_results(text: &str) -> Option<TranscriptEvent> {
    let message: ResultsMessage = serde_json::from_str(text).ok()?;
    if !message.kind.is_empty() && message.kind != "Results" {
        return None;
    }

    let alternative = message.channel?.alternatives.into_iter().next()?;
    if alternative.transcript.trim().is_empty() {
        return None;
    }

    Some(TranscriptEvent {
        text: alternative.transcript,
        is_final: message.is_final,
        speech_final: message.speech_final,
        confidence: alternative.confidence,
    })
}

/// Listen URL with the stream parameters as query string
pub fn listen_url(endpoint: &str, config: &StreamConfig) -> String {
    let mut url = format!(
        "{}?encoding={}&sample_rate={}&channels={}&punctuate={}&interim_results={}",
        endpoint,
        config.format.encoding.as_str(),
        config.format.sample_rate,
        config.format.channels,
        config.punctuate,
        config.interim_results
    );
    if let Some(language) = &config.language {
        url.push_str("&language=");
        url.push_str(language);
    }
    url
}

/// Deepgram live transcription over WebSocket
pub struct DeepgramStream {
    endpoint: String,
    api_key: String,
    outbound: Option<mpsc::Sender<Message>>,
    open: Arc<AtomicBool>,
    reader_handle: Option<JoinHandle<()>>,
}

impl DeepgramStream {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            endpoint,
            api_key,
            outbound: None,
            open: Arc::new(AtomicBool::new(false)),
            reader_handle: None,
        }
    }
}

#[async_trait::async_trait]
impl TranscriptionStream for DeepgramStream {
    async fn open(
        &mut self,
        config: &StreamConfig,
    ) -> Result<mpsc::Receiver<RecognizerEvent>, RecognitionError> {
        if self.api_key.is_empty() {
            return Err(RecognitionError::Config("Deepgram API key is missing".to_string()));
        }

        let url = listen_url(&self.endpoint, config);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RecognitionError::Config(format!("Invalid Deepgram URL: {}", e)))?;
        let token = HeaderValue::from_str(&format!("Token {}", self.api_key))
            .map_err(|e| RecognitionError::Config(format!("Invalid Deepgram API key: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, token);

        let (socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RecognitionError::Connect(e.to_string()))?;

        info!("Deepgram WebSocket connected");

        let (mut sink, mut stream) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::channel::<Message>(256);
        let (events_tx, events_rx) = mpsc::channel(64);
        self.open.store(true, Ordering::SeqCst);

        // Writer ends when the sender is dropped on close
        let writer_open = Arc::clone(&self.open);
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    warn!("Deepgram write failed: {}", e);
                    writer_open.store(false, Ordering::SeqCst);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_open = Arc::clone(&self.open);
        let reader = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = parse_results(&text) {
                            if events_tx.send(RecognizerEvent::Transcript(event)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!("Deepgram closed the stream: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        reader_open.store(false, Ordering::SeqCst);
                        let _ = events_tx.send(RecognizerEvent::Error(e.to_string())).await;
                        break;
                    }
                }
            }

            reader_open.store(false, Ordering::SeqCst);
            let _ = events_tx.send(RecognizerEvent::Closed).await;
        });

        self.outbound = Some(outbound);
        self.reader_handle = Some(reader);

        Ok(events_rx)
    }

    async fn send(&mut self, frame: &AudioFrame) -> Result<(), RecognitionError> {
        let Some(outbound) = &self.outbound else {
            debug!("Dropping audio for closed Deepgram stream");
            return Ok(());
        };
        if !self.open.load(Ordering::SeqCst) {
            debug!("Dropping audio for closed Deepgram stream");
            return Ok(());
        }

        outbound
            .send(Message::Binary(frame.data.clone()))
            .await
            .map_err(|_| RecognitionError::Stream("Deepgram writer stopped".to_string()))
    }

    async fn close(&mut self) {
        let Some(outbound) = self.outbound.take() else {
            return;
        };

        if self.open.swap(false, Ordering::SeqCst) {
            let _ = outbound.send(Message::Text(CLOSE_STREAM.to_string())).await;
        }
        drop(outbound);

        if let Some(reader) = self.reader_handle.take() {
            reader.abort();
        }

        info!("Deepgram stream closed");
    }

    fn is_open(&self) -> bool {
        self.outbound.is_some() && self.open.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "deepgram"
    }
}

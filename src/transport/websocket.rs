use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use base64::Engine;
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::control::parse_control_frame;
use super::link::{InboundMessage, OutboundFraming, TransportLink};
use crate::audio::{AudioFormat, AudioFrame};
use crate::error::TransportError;

/// Outbound frames queued ahead of the socket writer
const OUTBOUND_QUEUE: usize = 256;

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// `TransportLink` over an accepted axum WebSocket
///
/// Writes go through a queue drained by one writer task, so the pacer, the
/// heartbeat and teardown can all send without sharing the sink.
pub struct WebSocketLink {
    outbound: mpsc::Sender<Message>,
    open: Arc<AtomicBool>,
    /// Set by the writer when the socket rejected a frame
    write_failed: Arc<AtomicBool>,
    framing: OutboundFraming,
    writer_handle: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketLink {
    /// Take ownership of the sink half and start the writer task
    pub fn spawn(mut sink: SplitSink<WebSocket, Message>, framing: OutboundFraming) -> Arc<Self> {
        let (outbound, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
        let open = Arc::new(AtomicBool::new(true));
        let write_failed = Arc::new(AtomicBool::new(false));

        let writer_open = Arc::clone(&open);
        let writer_failed = Arc::clone(&write_failed);
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));

                if let Err(e) = sink.send(message).await {
                    warn!("WebSocket write failed: {}", e);
                    writer_failed.store(true, Ordering::SeqCst);
                    break;
                }

                if closing {
                    break;
                }
            }

            writer_open.store(false, Ordering::SeqCst);
            if let Err(e) = sink.close().await {
                debug!("WebSocket sink close: {}", e);
            }
        });

        Arc::new(Self {
            outbound,
            open,
            write_failed,
            framing,
            writer_handle: Mutex::new(Some(writer)),
        })
    }

    /// Record that the peer closed the socket
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn frame_audio(&self, chunk: &[u8]) -> Message {
        match self.framing {
            OutboundFraming::Binary => Message::Binary(chunk.to_vec()),
            OutboundFraming::JsonMedia => {
                let payload = base64::engine::general_purpose::STANDARD.encode(chunk);
                Message::Text(serde_json::json!({ "type": "media", "payload": payload }).to_string())
            }
        }
    }

    async fn enqueue(&self, message: Message) -> Result<(), TransportError> {
        if self.write_failed.load(Ordering::SeqCst) {
            return Err(TransportError::Send("socket write failed".to_string()));
        }
        if !self.is_open() {
            return Err(TransportError::Closed);
        }

        self.outbound.send(message).await.map_err(|_| {
            self.mark_closed();
            TransportError::Closed
        })
    }
}

#[async_trait::async_trait]
impl TransportLink for WebSocketLink {
    async fn send_audio(&self, chunk: &[u8]) -> Result<(), TransportError> {
        let message = self.frame_audio(chunk);
        self.enqueue(message).await
    }

    async fn send_ping(&self) -> Result<(), TransportError> {
        self.enqueue(Message::Ping(Vec::new())).await
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }

    async fn close(&self) {
        let handle = self.writer_handle.lock().await.take();
        let Some(mut handle) = handle else {
            return;
        };

        if !self.open.swap(false, Ordering::SeqCst) {
            // Peer already went away, nothing left to flush
            handle.abort();
            return;
        }

        // Writer drains what is queued, then sends the close frame
        if self.outbound.send(Message::Close(None)).await.is_ok() {
            match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut handle).await {
                Ok(Err(e)) => warn!("WebSocket writer task panicked: {}", e),
                Ok(Ok(())) => {}
                Err(_) => {
                    warn!("WebSocket writer did not drain in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}

/// Translate one received WebSocket message
///
/// Malformed control frames are logged and dropped (`None`); they never reach
/// the session.
pub fn decode_ws_message(message: Message, format: AudioFormat) -> Option<InboundMessage> {
    match message {
        Message::Binary(data) => Some(InboundMessage::Audio(AudioFrame::new(data, format))),
        Message::Text(text) => match parse_control_frame(&text, format) {
            Ok(event) => Some(InboundMessage::Control(event)),
            Err(e) => {
                warn!("Ignoring malformed control frame: {}", e);
                None
            }
        },
        Message::Ping(_) => Some(InboundMessage::Ping),
        Message::Pong(_) => Some(InboundMessage::Pong),
        Message::Close(_) => Some(InboundMessage::Closed),
    }
}

use serde::{Deserialize, Serialize};

use super::control::ControlEvent;
use crate::audio::AudioFrame;
use crate::error::TransportError;

/// How outbound audio chunks are framed for the active transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundFraming {
    /// Raw binary frames (Exotel-style bidirectional streams)
    #[default]
    Binary,
    /// `{"type":"media","payload":"<base64>"}` text frames
    JsonMedia,
}

/// Everything the caller's leg can deliver to a session
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// Binary audio frame
    Audio(AudioFrame),
    /// Parsed JSON control frame
    Control(ControlEvent),
    Ping,
    Pong,
    /// Transport closed by the peer
    Closed,
    /// Transport failed; the session must close
    Error(String),
}

/// Outbound half of the caller's leg
///
/// Implementations:
/// - `WebSocketLink`: axum WebSocket accepted from the telephony provider
/// - test fakes recording what was sent
#[async_trait::async_trait]
pub trait TransportLink: Send + Sync {
    /// Send one chunk of wire audio, framed the way this transport expects
    async fn send_audio(&self, chunk: &[u8]) -> Result<(), TransportError>;

    /// Send a liveness ping
    async fn send_ping(&self) -> Result<(), TransportError>;

    /// Whether the link can still carry frames
    fn is_open(&self) -> bool;

    /// Close the link; closing a closed link is a no-op
    async fn close(&self);
}

//! Fault taxonomy for a call session.
//!
//! ```text
//! TransportError    -- telephony leg closed/errored, fatal to the session
//! RecognitionError  -- recognizer unavailable, session keeps running
//! DialogError       -- dialog engine failed, fallback utterance is spoken
//! SynthesisError    -- speech conversion failed, playback is skipped
//! ProtocolError     -- malformed control frame, logged and ignored
//! PacingError       -- transport went away during playback
//! ```
//!
//! Only `TransportError` tears a session down; everything else is contained in
//! the turn that produced it.

use thiserror::Error;

/// Errors from the caller's telephony leg.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The link is no longer open
    #[error("Transport closed")]
    Closed,

    /// Writing to the link failed
    #[error("Transport send failed: {0}")]
    Send(String),
}

/// Errors from a streaming recognizer connection.
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Recognizer connection failed: {0}")]
    Connect(String),

    #[error("Recognizer stream error: {0}")]
    Stream(String),

    #[error("Recognizer not configured: {0}")]
    Config(String),
}

/// Errors from a dialog engine exchange.
#[derive(Error, Debug)]
pub enum DialogError {
    #[error("Dialog request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Dialog API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Dialog network error: {0}")]
    Network(String),

    #[error("Malformed dialog response: {0}")]
    Malformed(String),
}

/// Errors while converting reply text into wire audio.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Synthesis request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Synthesis API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Synthesis network error: {0}")]
    Network(String),

    /// Decoding or re-encoding the returned audio failed
    #[error("Transcoding failed: {0}")]
    Transcode(String),

    #[error("Synthesis returned no audio")]
    Empty,
}

/// Errors parsing an inbound control frame.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid control frame JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Control frame has no type/event discriminator")]
    MissingDiscriminator,

    #[error("Media frame has no payload")]
    MissingPayload,

    #[error("Invalid media payload: {0}")]
    Payload(#[from] base64::DecodeError),
}

/// Playback aborted before the whole buffer went out.
#[derive(Error, Debug)]
pub enum PacingError {
    #[error("Transport closed after {chunks_sent} chunks")]
    TransportClosed { chunks_sent: usize },

    #[error("Send failed after {chunks_sent} chunks: {source}")]
    Send {
        chunks_sent: usize,
        #[source]
        source: TransportError,
    },
}

impl PacingError {
    /// Chunks that reached the transport before the abort
    pub fn chunks_sent(&self) -> usize {
        match self {
            PacingError::TransportClosed { chunks_sent } => *chunks_sent,
            PacingError::Send { chunks_sent, .. } => *chunks_sent,
        }
    }
}

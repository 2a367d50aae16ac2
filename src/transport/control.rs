use base64::Engine;
use serde_json::Value;

use crate::audio::{AudioFormat, AudioFrame};
use crate::error::ProtocolError;

/// Typed control signal from the telephony provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Connected,
    /// Streaming begins
    Start {
        call_id: Option<String>,
        stream_id: Option<String>,
    },
    /// Audio multiplexed inside JSON
    Media(AudioFrame),
    /// Keypress, informational only
    Dtmf(String),
    /// Caller leg ended
    Stop,
    /// Mid-call reset: drop the in-flight turn
    Clear,
    /// Anything else, carrying the discriminator seen
    Unknown(String),
}

impl ControlEvent {
    pub fn kind(&self) -> &str {
        match self {
            ControlEvent::Connected => "connected",
            ControlEvent::Start { .. } => "start",
            ControlEvent::Media(_) => "media",
            ControlEvent::Dtmf(_) => "dtmf",
            ControlEvent::Stop => "stop",
            ControlEvent::Clear => "clear",
            ControlEvent::Unknown(kind) => kind,
        }
    }
}

/// First string found at any of the given paths
fn find_str(value: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| {
        path.iter()
            .try_fold(value, |node, key| node.get(*key))
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

/// Parse a JSON control frame
///
/// Providers disagree on the discriminator (`type` vs `event`) and on where
/// nested fields live, so both layouts are accepted. `format` describes the
/// audio carried by `media` frames.
pub fn parse_control_frame(text: &str, format: AudioFormat) -> Result<ControlEvent, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;

    let kind = find_str(&value, &[&["type"], &["event"]])
        .ok_or(ProtocolError::MissingDiscriminator)?;

    let event = match kind.as_str() {
        "connected" => ControlEvent::Connected,
        "start" => ControlEvent::Start {
            call_id: find_str(
                &value,
                &[
                    &["start", "call_sid"],
                    &["start", "callSid"],
                    &["call_sid"],
                    &["callSid"],
                ],
            ),
            stream_id: find_str(
                &value,
                &[
                    &["start", "stream_sid"],
                    &["start", "streamSid"],
                    &["stream_sid"],
                    &["streamSid"],
                ],
            ),
        },
        "media" => {
            let payload = find_str(&value, &[&["media", "payload"], &["payload"]])
                .ok_or(ProtocolError::MissingPayload)?;
            let data = base64::engine::general_purpose::STANDARD.decode(payload)?;
            ControlEvent::Media(AudioFrame::new(data, format))
        }
        "dtmf" => ControlEvent::Dtmf(
            find_str(&value, &[&["dtmf", "digit"], &["digit"]]).unwrap_or_default(),
        ),
        "stop" => ControlEvent::Stop,
        "clear" => ControlEvent::Clear,
        _ => ControlEvent::Unknown(kind),
    };

    Ok(event)
}

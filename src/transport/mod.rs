//! Caller telephony leg
//!
//! The call arrives as one long-lived WebSocket carrying binary audio,
//! JSON control frames and ping/pong liveness frames. This module turns that
//! into typed `InboundMessage`s for the session and exposes the outbound half
//! as a `TransportLink`.

mod control;
mod link;
mod websocket;

pub use control::{parse_control_frame, ControlEvent};
pub use link::{InboundMessage, OutboundFraming, TransportLink};
pub use websocket::{decode_ws_message, WebSocketLink};

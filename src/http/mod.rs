//! HTTP surface of the bridge
//!
//! - GET /health - Health check with the active call count
//! - GET /sessions - Stats for every live call
//! - GET /sessions/:id - Stats for one call
//! - GET / and GET /media - WebSocket upgrade for the telephony media stream

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;

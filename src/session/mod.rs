//! Per-call session orchestration
//!
//! A `SessionOrchestrator` owns one call end to end:
//! - caller audio in, forwarded to the recognizer
//! - final utterances turned into dialog exchanges
//! - replies synthesized and paced back out at real-time cadence
//! - heartbeat, barge-in and teardown
//!
//! At most one turn runs per session; see `TurnLock`.

mod config;
mod heartbeat;
mod orchestrator;
mod registry;
mod state;
mod stats;

pub use config::SessionConfig;
pub use heartbeat::HeartbeatMonitor;
pub use orchestrator::{SessionOrchestrator, SessionServices};
pub use registry::SessionRegistry;
pub use state::{SessionState, TurnGuard, TurnLock};
pub use stats::{SessionCounters, SessionStats};

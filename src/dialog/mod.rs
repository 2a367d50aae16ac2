//! Dialog engine exchange
//!
//! One utterance in, one reply text out. The orchestrator owns all recovery
//! (fallback utterance), so implementations just report what went wrong.

pub mod voiceflow;

use crate::error::DialogError;

pub use voiceflow::VoiceflowClient;

#[async_trait::async_trait]
pub trait DialogClient: Send + Sync {
    /// Send `utterance` on behalf of `session_id` and return the reply text
    ///
    /// An empty string means the engine had nothing to say.
    async fn interact(&self, session_id: &str, utterance: &str) -> Result<String, DialogError>;
}

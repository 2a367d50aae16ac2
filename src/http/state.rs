use std::sync::Arc;

use crate::config::TransportConfig;
use crate::session::{SessionConfig, SessionRegistry, SessionServices};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Live calls (session_id → session)
    pub registry: SessionRegistry,

    /// Recognizer, dialog and synthesis shared by all calls
    pub services: SessionServices,

    /// Template for each new call
    pub session_config: Arc<SessionConfig>,

    /// Caller leg wire format and outbound framing
    pub transport: TransportConfig,
}

impl AppState {
    pub fn new(
        services: SessionServices,
        session_config: SessionConfig,
        transport: TransportConfig,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(),
            services,
            session_config: Arc::new(session_config),
            transport,
        }
    }
}

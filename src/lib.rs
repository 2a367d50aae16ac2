pub mod audio;
pub mod config;
pub mod dialog;
pub mod error;
pub mod http;
pub mod recognizer;
pub mod session;
pub mod synthesis;
pub mod transport;

pub use audio::{AudioEncoding, AudioFormat, AudioFrame, AudioPacer};
pub use config::Config;
pub use dialog::{DialogClient, VoiceflowClient};
pub use error::{
    DialogError, PacingError, ProtocolError, RecognitionError, SynthesisError, TransportError,
};
pub use http::{create_router, AppState};
pub use recognizer::{
    ConfiguredRecognizerFactory, RecognizerEvent, RecognizerFactory, StreamConfig,
    TranscriptEvent, TranscriptionStream,
};
pub use session::{
    HeartbeatMonitor, SessionConfig, SessionOrchestrator, SessionRegistry, SessionServices,
    SessionState, SessionStats,
};
pub use synthesis::{ElevenLabsClient, SynthesisClient, VoiceConfig};
pub use transport::{ControlEvent, InboundMessage, OutboundFraming, TransportLink};

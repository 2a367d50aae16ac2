use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use super::heartbeat::HeartbeatMonitor;
use super::state::{SessionState, TurnGuard, TurnLock};
use super::stats::{SessionCounters, SessionStats};
use crate::audio::{AudioFrame, AudioPacer};
use crate::dialog::DialogClient;
use crate::error::RecognitionError;
use crate::recognizer::{RecognizerEvent, RecognizerFactory, TranscriptEvent, TranscriptionStream};
use crate::synthesis::SynthesisClient;
use crate::transport::{ControlEvent, InboundMessage, TransportLink};

/// Shared collaborators handed to every session
#[derive(Clone)]
pub struct SessionServices {
    pub recognizers: Arc<dyn RecognizerFactory>,
    pub dialog: Arc<dyn DialogClient>,
    pub synthesis: Arc<dyn SynthesisClient>,
}

enum TurnInput {
    /// Spoken as-is, no dialog exchange
    Greeting(String),
    /// Final caller utterance
    Utterance(String),
}

/// One live call: transport, recognizer, dialog and synthesis tied together
///
/// Inbound messages arrive through `handle_inbound`. Recognizer events and
/// turns run on their own tasks; those tasks hold a `Weak` back-reference so
/// a dropped session is never kept alive by its own workers.
pub struct SessionOrchestrator {
    session_id: String,
    call_id: RwLock<Option<String>>,
    config: SessionConfig,
    transport: Arc<dyn TransportLink>,
    services: SessionServices,
    pacer: AudioPacer,
    started_at: DateTime<Utc>,

    state: watch::Sender<SessionState>,
    turn_lock: Arc<TurnLock>,
    counters: SessionCounters,

    stream_active: AtomicBool,
    closed: AtomicBool,

    recognizer: Mutex<Option<Box<dyn TranscriptionStream>>>,
    /// Final segments of an utterance still waiting for its endpoint
    pending_segments: Mutex<Vec<String>>,
    heartbeat: HeartbeatMonitor,

    /// In-flight turn; also serializes turn start against clear
    turn_task: Mutex<Option<JoinHandle<()>>>,
    greeting_task: Mutex<Option<JoinHandle<()>>>,
    events_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionOrchestrator {
    /// Accept a call on `transport` and bring the session to `Listening`
    ///
    /// Fails only when the recognizer cannot be opened and the configuration
    /// requires one; the session is torn down before returning the error.
    pub async fn start(
        transport: Arc<dyn TransportLink>,
        services: SessionServices,
        config: SessionConfig,
    ) -> Result<Arc<Self>, RecognitionError> {
        let session_id = format!("call-{}", Uuid::new_v4());
        info!("[{}] New connection", session_id);

        let (state, _) = watch::channel(SessionState::Connecting);
        let heartbeat =
            HeartbeatMonitor::start(Arc::clone(&transport), config.heartbeat_interval, &session_id);

        let session = Arc::new(Self {
            pacer: AudioPacer::new(config.chunk_size, config.wire_format),
            session_id,
            call_id: RwLock::new(None),
            config,
            transport,
            services,
            started_at: Utc::now(),
            state,
            turn_lock: TurnLock::new(),
            counters: SessionCounters::default(),
            stream_active: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            recognizer: Mutex::new(None),
            pending_segments: Mutex::new(Vec::new()),
            heartbeat,
            turn_task: Mutex::new(None),
            greeting_task: Mutex::new(None),
            events_task: Mutex::new(None),
        });

        if let Err(e) = session.open_recognizer().await {
            error!("[{}] Recognizer required but unavailable: {}", session.session_id, e);
            session.shutdown("recognizer unavailable").await;
            return Err(e);
        }

        // Must precede the greeting task, whose turn owns the state from then on
        session.transition(SessionState::Listening);
        session.schedule_greeting().await;

        info!("[{}] Session ready", session.session_id);
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    pub async fn call_id(&self) -> Option<String> {
        self.call_id.read().await.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_stream_active(&self) -> bool {
        self.stream_active.load(Ordering::SeqCst)
    }

    pub fn turn_in_flight(&self) -> bool {
        self.turn_lock.is_locked()
    }

    pub async fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_running().await
    }

    pub async fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            session_id: self.session_id.clone(),
            call_id: self
                .call_id()
                .await
                .unwrap_or_else(|| "unknown".to_string()),
            state: self.state(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_received: self.counters.frames_received(),
            frames_sent: self.counters.frames_sent(),
            turns_completed: self.counters.turns_completed(),
            stream_active: self.is_stream_active(),
            turn_in_flight: self.turn_in_flight(),
            heartbeats_sent: self.heartbeat.pings_sent(),
        }
    }

    /// Dispatch one decoded transport message
    pub async fn handle_inbound(self: &Arc<Self>, message: InboundMessage) {
        match message {
            InboundMessage::Audio(frame) => self.handle_audio_frame(frame).await,
            InboundMessage::Control(event) => self.handle_control_event(event).await,
            InboundMessage::Ping => debug!("[{}] Ping from peer", self.session_id),
            InboundMessage::Pong => debug!("[{}] Pong received", self.session_id),
            InboundMessage::Closed => {
                self.close("transport closed").await;
            }
            InboundMessage::Error(e) => {
                error!("[{}] Transport error: {}", self.session_id, e);
                self.close("transport error").await;
            }
        }
    }

    pub async fn handle_control_event(&self, event: ControlEvent) {
        match event {
            ControlEvent::Connected => info!("[{}] Caller leg connected", self.session_id),
            ControlEvent::Start { call_id, stream_id } => {
                info!(
                    "[{}] Stream started (call: {}, stream: {})",
                    self.session_id,
                    call_id.as_deref().unwrap_or("unknown"),
                    stream_id.as_deref().unwrap_or("unknown")
                );
                if call_id.is_some() {
                    *self.call_id.write().await = call_id;
                }
                self.stream_active.store(true, Ordering::SeqCst);
            }
            ControlEvent::Media(frame) => self.handle_audio_frame(frame).await,
            ControlEvent::Dtmf(digit) => info!("[{}] DTMF: {}", self.session_id, digit),
            ControlEvent::Stop => self.handle_stop().await,
            ControlEvent::Clear => self.handle_clear().await,
            ControlEvent::Unknown(kind) => {
                debug!("[{}] Ignoring control event: {}", self.session_id, kind)
            }
        }
    }

    /// Forward caller audio to the recognizer, or drop it if there is none
    pub async fn handle_audio_frame(&self, frame: AudioFrame) {
        self.counters.record_received();

        let mut recognizer = self.recognizer.lock().await;
        let Some(stream) = recognizer.as_mut().filter(|s| s.is_open()) else {
            return;
        };

        if let Err(e) = stream.send(&frame).await {
            debug!("[{}] Dropped audio frame: {}", self.session_id, e);
        }
    }

    /// Start a turn for a final utterance, unless one is already in flight
    pub async fn handle_transcript(self: &Arc<Self>, event: TranscriptEvent) {
        if self.is_closed() {
            return;
        }

        if !event.is_final {
            debug!("[{}] Interim: {}", self.session_id, event.text);
            return;
        }

        let text = {
            let mut segments = self.pending_segments.lock().await;
            let segment = event.text.trim();
            if !segment.is_empty() {
                segments.push(segment.to_string());
            }

            if !event.ends_utterance(self.config.require_speech_final) {
                debug!("[{}] Final segment, utterance continues", self.session_id);
                return;
            }
            std::mem::take(&mut *segments).join(" ")
        };

        if text.is_empty() {
            return;
        }

        info!("[{}] USER SAID: \"{}\"", self.session_id, text);

        if !self.begin_turn(TurnInput::Utterance(text.clone())).await {
            info!(
                "[{}] Turn in flight, discarding utterance: \"{}\"",
                self.session_id, text
            );
        }
    }

    /// Tear down the session; later calls return the final stats unchanged
    pub async fn close(&self, reason: &str) -> SessionStats {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("[{}] Already closed", self.session_id);
            return self.stats().await;
        }

        info!("[{}] Closing session: {}", self.session_id, reason);
        self.state.send_modify(|state| *state = SessionState::Closed);

        if let Some(handle) = self.greeting_task.lock().await.take() {
            handle.abort();
        }

        {
            let mut turn = self.turn_task.lock().await;
            if let Some(handle) = turn.take() {
                handle.abort();
            }
            self.turn_lock.force_release();
        }

        if let Some(handle) = self.events_task.lock().await.take() {
            handle.abort();
        }

        self.heartbeat.cancel().await;

        if let Some(mut stream) = self.recognizer.lock().await.take() {
            stream.close().await;
        }

        self.stream_active.store(false, Ordering::SeqCst);

        let stats = self.stats().await;
        info!(
            "[{}] Session ended after {:.1}s ({} frames in, {} chunks out, {} turns)",
            self.session_id,
            stats.duration_secs,
            stats.frames_received,
            stats.frames_sent,
            stats.turns_completed
        );
        stats
    }

    /// Close the session and the caller's leg with it
    pub async fn shutdown(&self, reason: &str) -> SessionStats {
        let stats = self.close(reason).await;
        self.transport.close().await;
        stats
    }

    async fn handle_stop(&self) {
        info!("[{}] Stream stopped by caller", self.session_id);
        self.stream_active.store(false, Ordering::SeqCst);
        self.close("stream stopped").await;
    }

    /// Barge-in: abandon the in-flight turn and go back to listening
    async fn handle_clear(&self) {
        if self.is_closed() {
            return;
        }

        let aborted = {
            let mut turn = self.turn_task.lock().await;
            if let Some(handle) = turn.take() {
                handle.abort();
            }
            let aborted = self.turn_lock.force_release();
            // Still holding turn_task: no new turn can start before this lands
            self.transition(SessionState::Listening);
            aborted
        };
        self.pending_segments.lock().await.clear();

        if aborted {
            info!("[{}] Clear received, turn abandoned", self.session_id);
        } else {
            debug!("[{}] Clear received with no turn in flight", self.session_id);
        }
    }

    async fn open_recognizer(self: &Arc<Self>) -> Result<(), RecognitionError> {
        let mut stream = self.services.recognizers.create(&self.session_id);

        match stream.open(&self.config.stream).await {
            Ok(events) => {
                info!("[{}] {} stream open", self.session_id, stream.name());
                *self.recognizer.lock().await = Some(stream);

                let handle = tokio::spawn(Self::pump_events(Arc::downgrade(self), events));
                *self.events_task.lock().await = Some(handle);
                Ok(())
            }
            Err(e) if self.config.recognizer_required => Err(e),
            Err(e) => {
                warn!(
                    "[{}] Recognizer unavailable, continuing without transcription: {}",
                    self.session_id, e
                );
                Ok(())
            }
        }
    }

    async fn pump_events(session: Weak<Self>, mut events: mpsc::Receiver<RecognizerEvent>) {
        while let Some(event) = events.recv().await {
            let Some(session) = session.upgrade() else {
                break;
            };

            match event {
                RecognizerEvent::Transcript(transcript) => {
                    session.handle_transcript(transcript).await
                }
                RecognizerEvent::Error(message) => {
                    session.on_recognizer_fault(message).await;
                    break;
                }
                RecognizerEvent::Closed => {
                    info!("[{}] Recognizer stream closed", session.session_id);
                    break;
                }
            }
        }
    }

    async fn on_recognizer_fault(self: &Arc<Self>, message: String) {
        warn!("[{}] Recognizer error: {}", self.session_id, message);

        if let Some(mut stream) = self.recognizer.lock().await.take() {
            stream.close().await;
        }

        if self.config.recognizer_required {
            // Shut down off this task; close() aborts the event pump
            let session = Arc::clone(self);
            tokio::spawn(async move {
                session.shutdown("recognizer failed").await;
            });
        }
    }

    async fn schedule_greeting(self: &Arc<Self>) {
        let Some(text) = self.config.greeting_text.clone() else {
            return;
        };

        let session = Arc::downgrade(self);
        let delay = self.config.greeting_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(session) = session.upgrade() else {
                return;
            };

            if !session.begin_turn(TurnInput::Greeting(text)).await {
                debug!("[{}] Caller spoke first, skipping greeting", session.session_id);
            }
        });

        *self.greeting_task.lock().await = Some(handle);
    }

    /// Acquire the turn lock and spawn the turn; false if a turn is running
    async fn begin_turn(self: &Arc<Self>, input: TurnInput) -> bool {
        let mut turn = self.turn_task.lock().await;
        if self.is_closed() {
            return false;
        }

        let Some(guard) = self.turn_lock.try_acquire() else {
            return false;
        };

        let session = Arc::clone(self);
        *turn = Some(tokio::spawn(async move {
            session.run_turn(input, guard).await;
        }));
        true
    }

    async fn run_turn(&self, input: TurnInput, guard: TurnGuard) {
        let reply = match input {
            TurnInput::Greeting(text) => text,
            TurnInput::Utterance(text) => {
                if !self.turn_transition(&guard, SessionState::Thinking) {
                    return;
                }
                self.ask_dialog(&text).await
            }
        };

        if !self.turn_transition(&guard, SessionState::Speaking) {
            return;
        }
        self.speak(&reply).await;

        if self.turn_transition(&guard, SessionState::Listening) {
            self.counters.record_turn();
        }
    }

    async fn ask_dialog(&self, utterance: &str) -> String {
        let exchange = self.services.dialog.interact(&self.session_id, utterance);

        match timeout(self.config.dialog_timeout, exchange).await {
            Ok(Ok(reply)) if !reply.trim().is_empty() => {
                let reply = reply.trim().to_string();
                info!("[{}] BOT SAYS: \"{}\"", self.session_id, reply);
                reply
            }
            Ok(Ok(_)) => {
                warn!("[{}] Dialog returned no text, using fallback", self.session_id);
                self.config.fallback_text.clone()
            }
            Ok(Err(e)) => {
                warn!("[{}] Dialog error, using fallback: {}", self.session_id, e);
                self.config.fallback_text.clone()
            }
            Err(_) => {
                warn!(
                    "[{}] Dialog timed out after {:?}, using fallback",
                    self.session_id, self.config.dialog_timeout
                );
                self.config.fallback_text.clone()
            }
        }
    }

    async fn speak(&self, text: &str) {
        let request = self.services.synthesis.synthesize(text, &self.config.voice);

        let audio = match timeout(self.config.synthesis_timeout, request).await {
            Ok(Ok(audio)) if !audio.is_empty() => audio,
            Ok(Ok(_)) => {
                warn!("[{}] Synthesis returned no audio", self.session_id);
                return;
            }
            Ok(Err(e)) => {
                warn!("[{}] Synthesis failed, skipping playback: {}", self.session_id, e);
                return;
            }
            Err(_) => {
                warn!(
                    "[{}] Synthesis timed out after {:?}",
                    self.session_id, self.config.synthesis_timeout
                );
                return;
            }
        };

        match self.pacer.send_paced(self.transport.as_ref(), &audio).await {
            Ok(chunks) => {
                self.counters.record_sent(chunks);
                info!(
                    "[{}] Audio sent ({} bytes, {} chunks)",
                    self.session_id,
                    audio.len(),
                    chunks
                );
            }
            Err(e) => {
                self.counters.record_sent(e.chunks_sent());
                warn!("[{}] Playback cut short: {}", self.session_id, e);
            }
        }
    }

    /// Lifecycle transition; refused once closed
    fn transition(&self, next: SessionState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Closed || *state == next {
                return false;
            }
            debug!("[{}] {} -> {}", self.session_id, state, next);
            *state = next;
            true
        })
    }

    /// Transition on behalf of a turn; false if the turn was abandoned
    ///
    /// The guard is checked under the state channel's lock, so a clear that
    /// force-released the turn lock cannot be overwritten by the old turn.
    fn turn_transition(&self, guard: &TurnGuard, next: SessionState) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if *state == SessionState::Closed || !guard.is_current() {
                return false;
            }
            applied = true;
            if *state == next {
                return false;
            }
            debug!("[{}] {} -> {}", self.session_id, state, next);
            *state = next;
            true
        });
        applied
    }
}

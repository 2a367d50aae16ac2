// Test doubles for the session's collaborators
//
// Each fake records what it was asked to do so tests can assert on the
// conversation without a network.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use callbridge::audio::AudioFrame;
use callbridge::error::{DialogError, RecognitionError, SynthesisError, TransportError};
use callbridge::recognizer::{
    RecognizerEvent, RecognizerFactory, StreamConfig, TranscriptEvent, TranscriptionStream,
};
use callbridge::session::{SessionConfig, SessionServices};
use callbridge::synthesis::VoiceConfig;
use callbridge::{DialogClient, SynthesisClient, TransportLink};
use tokio::sync::mpsc;
use tokio::time::Instant;

// ============================================================================
// Transport
// ============================================================================

/// In-memory caller leg
#[derive(Default)]
pub struct RecordingTransport {
    open: AtomicBool,
    chunks: Mutex<Vec<(Instant, Vec<u8>)>>,
    pings: AtomicUsize,
    closes: AtomicUsize,
    /// Report closed after this many audio chunks
    close_after: Option<usize>,
    fail_sends: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            open: AtomicBool::new(true),
            ..Default::default()
        })
    }

    pub fn closing_after(chunks: usize) -> Arc<Self> {
        Arc::new(Self {
            open: AtomicBool::new(true),
            close_after: Some(chunks),
            ..Default::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        let transport = Self::new();
        transport.fail_sends.store(true, Ordering::SeqCst);
        transport
    }

    pub fn hang_up(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    pub fn chunk_times(&self) -> Vec<Instant> {
        self.chunks.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn bytes_sent(&self) -> Vec<u8> {
        self.chunks
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, c)| c.clone())
            .collect()
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportLink for RecordingTransport {
    async fn send_audio(&self, chunk: &[u8]) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send("broken pipe".to_string()));
        }
        if !self.is_open() {
            return Err(TransportError::Closed);
        }

        let mut chunks = self.chunks.lock().unwrap();
        chunks.push((Instant::now(), chunk.to_vec()));
        if self.close_after == Some(chunks.len()) {
            self.open.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn send_ping(&self) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Recognizer
// ============================================================================

/// Lets a test drive the recognizer's event channel
#[derive(Default)]
pub struct RecognizerProbe {
    events: Mutex<Option<mpsc::Sender<RecognizerEvent>>>,
    frames: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl RecognizerProbe {
    pub async fn emit(&self, event: RecognizerEvent) {
        let sender = self.events.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    pub async fn say(&self, text: &str) {
        self.emit(RecognizerEvent::Transcript(TranscriptEvent::final_result(text)))
            .await;
    }

    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct ScriptedRecognizerFactory {
    probe: Arc<RecognizerProbe>,
    fail_open: bool,
}

impl ScriptedRecognizerFactory {
    pub fn new() -> (Arc<Self>, Arc<RecognizerProbe>) {
        let probe = Arc::new(RecognizerProbe::default());
        let factory = Arc::new(Self {
            probe: Arc::clone(&probe),
            fail_open: false,
        });
        (factory, probe)
    }

    pub fn unavailable() -> (Arc<Self>, Arc<RecognizerProbe>) {
        let probe = Arc::new(RecognizerProbe::default());
        let factory = Arc::new(Self {
            probe: Arc::clone(&probe),
            fail_open: true,
        });
        (factory, probe)
    }
}

impl RecognizerFactory for ScriptedRecognizerFactory {
    fn create(&self, _session_id: &str) -> Box<dyn TranscriptionStream> {
        Box::new(ScriptedStream {
            probe: Arc::clone(&self.probe),
            fail_open: self.fail_open,
            open: false,
        })
    }
}

struct ScriptedStream {
    probe: Arc<RecognizerProbe>,
    fail_open: bool,
    open: bool,
}

#[async_trait]
impl TranscriptionStream for ScriptedStream {
    async fn open(
        &mut self,
        _config: &StreamConfig,
    ) -> Result<mpsc::Receiver<RecognizerEvent>, RecognitionError> {
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(RecognitionError::Connect("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::channel(32);
        *self.probe.events.lock().unwrap() = Some(tx);
        self.open = true;
        Ok(rx)
    }

    async fn send(&mut self, _frame: &AudioFrame) -> Result<(), RecognitionError> {
        if self.open {
            self.probe.frames.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// Dialog
// ============================================================================

#[derive(Clone)]
pub enum DialogScript {
    Reply(String),
    /// Reply after a delay
    Slow(Duration, String),
    Fail,
    /// Never answers
    Hang,
}

pub struct FakeDialog {
    script: DialogScript,
    utterances: Mutex<Vec<String>>,
}

impl FakeDialog {
    pub fn new(script: DialogScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            utterances: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(DialogScript::Reply(text.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.utterances.lock().unwrap().len()
    }

    pub fn utterances(&self) -> Vec<String> {
        self.utterances.lock().unwrap().clone()
    }
}

#[async_trait]
impl DialogClient for FakeDialog {
    async fn interact(&self, _session_id: &str, utterance: &str) -> Result<String, DialogError> {
        self.utterances.lock().unwrap().push(utterance.to_string());

        match &self.script {
            DialogScript::Reply(text) => Ok(text.clone()),
            DialogScript::Slow(delay, text) => {
                tokio::time::sleep(*delay).await;
                Ok(text.clone())
            }
            DialogScript::Fail => Err(DialogError::Api {
                status: 500,
                message: "internal error".to_string(),
            }),
            DialogScript::Hang => std::future::pending().await,
        }
    }
}

// ============================================================================
// Synthesis
// ============================================================================

pub struct FakeSynthesis {
    audio: Option<Vec<u8>>,
    hang: bool,
    texts: Mutex<Vec<String>>,
}

impl FakeSynthesis {
    /// Returns `len` bytes of μ-law silence for every request
    pub fn with_audio(len: usize) -> Arc<Self> {
        Arc::new(Self {
            audio: Some(vec![0xFF; len]),
            hang: false,
            texts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            audio: None,
            hang: false,
            texts: Mutex::new(Vec::new()),
        })
    }

    /// Never answers
    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            audio: None,
            hang: true,
            texts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.texts.lock().unwrap().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SynthesisClient for FakeSynthesis {
    async fn synthesize(&self, text: &str, _voice: &VoiceConfig) -> Result<Vec<u8>, SynthesisError> {
        self.texts.lock().unwrap().push(text.to_string());
        if self.hang {
            return std::future::pending().await;
        }
        match &self.audio {
            Some(audio) => Ok(audio.clone()),
            None => Err(SynthesisError::Api {
                status: 401,
                message: "invalid api key".to_string(),
            }),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn services(
    recognizers: Arc<ScriptedRecognizerFactory>,
    dialog: Arc<FakeDialog>,
    synthesis: Arc<FakeSynthesis>,
) -> SessionServices {
    SessionServices {
        recognizers,
        dialog,
        synthesis,
    }
}

/// Session config without greeting or heartbeat
pub fn quiet_config() -> SessionConfig {
    SessionConfig {
        greeting_text: None,
        heartbeat_interval: Duration::ZERO,
        ..SessionConfig::default()
    }
}

/// Poll `condition` until it holds; panics after `limit` of (virtual) time
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + limit;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within {:?}", limit);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Let spawned tasks run without advancing much time
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub async fn within<T>(limit: Duration, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(limit, future)
        .await
        .expect("future did not complete in time")
}

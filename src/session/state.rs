use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Lifecycle of a call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Transport accepted, sub-streams starting
    Connecting,
    /// Waiting for a final utterance
    Listening,
    /// Waiting on the dialog engine
    Thinking,
    /// Synthesizing and playing the reply
    Speaking,
    /// Terminal
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Listening => "listening",
            SessionState::Thinking => "thinking",
            SessionState::Speaking => "speaking",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

const LOCKED: u64 = 1;

/// Gate allowing at most one turn per session
///
/// One atomic word: bit 0 is the lock, the remaining bits count how many times
/// the lock has been released. A guard remembers the generation it acquired,
/// so after a forced release its drop cannot unlock a newer turn.
#[derive(Debug, Default)]
pub struct TurnLock {
    word: AtomicU64,
}

impl TurnLock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the lock if no turn is in flight
    pub fn try_acquire(self: &Arc<Self>) -> Option<TurnGuard> {
        self.word
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |word| {
                (word & LOCKED == 0).then_some(word | LOCKED)
            })
            .ok()
            .map(|previous| TurnGuard {
                lock: Arc::clone(self),
                generation: previous >> 1,
            })
    }

    pub fn is_locked(&self) -> bool {
        self.word.load(Ordering::SeqCst) & LOCKED != 0
    }

    /// Release regardless of who holds the lock; returns whether it was held
    pub fn force_release(&self) -> bool {
        self.word
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |word| {
                (word & LOCKED != 0).then_some(((word >> 1) + 1) << 1)
            })
            .is_ok()
    }

    fn release(&self, generation: u64) -> bool {
        self.word
            .compare_exchange(
                (generation << 1) | LOCKED,
                (generation + 1) << 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    fn holds(&self, generation: u64) -> bool {
        self.word.load(Ordering::SeqCst) == (generation << 1) | LOCKED
    }
}

/// Proof of holding the turn lock; releases on drop
#[derive(Debug)]
pub struct TurnGuard {
    lock: Arc<TurnLock>,
    generation: u64,
}

impl TurnGuard {
    /// False once the lock was force-released out from under this turn
    pub fn is_current(&self) -> bool {
        self.lock.holds(self.generation)
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.lock.release(self.generation);
    }
}

//! Real-time playback pacing
//!
//! A synthesized reply arrives as one buffer but the telephony leg expects it
//! at playback speed. Chunks of `chunk_size` bytes are sent on a schedule
//! derived from the wire rate: chunk `k` is due at
//! `start + bytes_before_k / bytes_per_ms`, so the whole buffer takes about
//! `len / bytes_per_ms` milliseconds and timer jitter never accumulates.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::debug;

use super::format::AudioFormat;
use crate::error::PacingError;
use crate::transport::TransportLink;

/// Default chunk size in bytes (128ms of 8kHz μ-law)
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct AudioPacer {
    chunk_size: usize,
    bytes_per_ms: f64,
}

impl AudioPacer {
    pub fn new(chunk_size: usize, format: AudioFormat) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            bytes_per_ms: format.bytes_per_ms(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Time between two full chunks
    pub fn chunk_interval(&self) -> Duration {
        self.offset(self.chunk_size)
    }

    /// Number of chunks a buffer of `len` bytes is split into
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size)
    }

    fn offset(&self, bytes: usize) -> Duration {
        if self.bytes_per_ms <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(bytes as f64 / self.bytes_per_ms / 1000.0)
    }

    /// Stream `audio` onto `link` at real-time cadence
    ///
    /// Returns the number of chunks sent. The link is checked before every
    /// chunk; if it has closed, or a send fails, the remaining chunks are
    /// abandoned and the error reports how many went out.
    pub async fn send_paced(
        &self,
        link: &dyn TransportLink,
        audio: &[u8],
    ) -> Result<usize, PacingError> {
        let start = Instant::now();
        let mut sent = 0usize;
        let mut bytes_sent = 0usize;

        for chunk in audio.chunks(self.chunk_size) {
            if !link.is_open() {
                return Err(PacingError::TransportClosed { chunks_sent: sent });
            }

            link.send_audio(chunk)
                .await
                .map_err(|source| PacingError::Send {
                    chunks_sent: sent,
                    source,
                })?;

            sent += 1;
            bytes_sent += chunk.len();

            // Hold until this chunk has had time to play out
            sleep_until(start + self.offset(bytes_sent)).await;
        }

        debug!(
            "Paced {} bytes in {} chunks over {:?}",
            audio.len(),
            sent,
            start.elapsed()
        );

        Ok(sent)
    }
}

impl Default for AudioPacer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, AudioFormat::TELEPHONY)
    }
}

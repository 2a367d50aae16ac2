use serde::{Deserialize, Serialize};

/// Sample encoding on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    /// G.711 μ-law, one byte per sample
    Mulaw,
    /// 16-bit signed little-endian PCM
    Linear16,
}

impl AudioEncoding {
    pub fn bytes_per_sample(self) -> u32 {
        match self {
            AudioEncoding::Mulaw => 1,
            AudioEncoding::Linear16 => 2,
        }
    }

    /// Name understood by recognizer query strings
    pub fn as_str(self) -> &'static str {
        match self {
            AudioEncoding::Mulaw => "mulaw",
            AudioEncoding::Linear16 => "linear16",
        }
    }
}

/// Encoding descriptor for a buffer of audio bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub encoding: AudioEncoding,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl AudioFormat {
    /// 8kHz mono μ-law, the telephony default
    pub const TELEPHONY: AudioFormat = AudioFormat {
        encoding: AudioEncoding::Mulaw,
        sample_rate: 8000,
        channels: 1,
    };

    /// Bytes of wire audio per millisecond of playback
    pub fn bytes_per_ms(&self) -> f64 {
        (self.sample_rate as f64
            * self.channels as f64
            * self.encoding.bytes_per_sample() as f64)
            / 1000.0
    }

    /// Playback duration of `len` bytes in this format, in milliseconds
    pub fn duration_ms(&self, len: usize) -> f64 {
        let rate = self.bytes_per_ms();
        if rate <= 0.0 {
            return 0.0;
        }
        len as f64 / rate
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::TELEPHONY
    }
}

/// Immutable audio payload plus its encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Raw encoded bytes
    pub data: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioFrame {
    pub fn new(data: Vec<u8>, format: AudioFormat) -> Self {
        Self { data, format }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_ms(&self) -> f64 {
        self.format.duration_ms(self.data.len())
    }
}

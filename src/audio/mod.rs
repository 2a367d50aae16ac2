pub mod format;
pub mod mulaw;
pub mod pacer;
pub mod transcode;

pub use format::{AudioEncoding, AudioFormat, AudioFrame};
pub use pacer::{AudioPacer, DEFAULT_CHUNK_SIZE};

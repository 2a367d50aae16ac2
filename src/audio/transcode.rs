//! Compressed speech → wire audio.
//!
//! Synthesis vendors return MP3. The transport wants raw samples in its own
//! format (8kHz mono μ-law for telephony), so the reply is decoded with
//! symphonia, mixed down to mono, resampled with rubato and re-encoded.

use std::io::Cursor;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use super::format::{AudioEncoding, AudioFormat};
use super::mulaw;
use crate::error::SynthesisError;

/// Decoded interleaved PCM
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decode an in-memory compressed stream (`extension` is a probe hint, e.g. "mp3")
pub fn decode(bytes: Vec<u8>, extension: &str) -> Result<DecodedAudio, SynthesisError> {
    let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension);

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| SynthesisError::Transcode(format!("probe failed: {}", e)))?;

    let mut reader = probed.format;
    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SynthesisError::Transcode("no decodable track".to_string()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SynthesisError::Transcode(format!("unsupported codec: {}", e)))?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);
    let mut samples = Vec::new();

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(SynthesisError::Transcode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // Corrupt frames are skipped, the rest of the stream is still usable
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(SynthesisError::Transcode(e.to_string())),
        }
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(SynthesisError::Empty);
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Average interleaved channels into one
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Band-limited resampler for mono signals
///
/// Windowed-sinc with the cutoff just under the lower Nyquist, so content
/// above 4kHz is filtered out instead of folding into the telephony band.
/// Output is aligned to the input (filter delay removed) and has exactly
/// `len * to_rate / from_rate` samples.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, SynthesisError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        1.0,
        params,
        samples.len(),
        1,
    )
    .map_err(|e| SynthesisError::Transcode(format!("resampler init failed: {}", e)))?;

    let expected = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let delay = resampler.output_delay();

    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| SynthesisError::Transcode(format!("resampling failed: {}", e)))?
        .into_iter()
        .next()
        .unwrap_or_default();

    // Flush the samples still held back by the filter
    let tail = resampler
        .process_partial(None::<&[&[f32]]>, None)
        .map_err(|e| SynthesisError::Transcode(format!("resampling failed: {}", e)))?;
    output.extend(tail.into_iter().next().unwrap_or_default());

    output.drain(..delay.min(output.len()));
    output.resize(expected, 0.0);
    Ok(output)
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Encode decoded audio into `target` wire bytes
pub fn encode(decoded: &DecodedAudio, target: AudioFormat) -> Result<Vec<u8>, SynthesisError> {
    let mono = downmix_to_mono(&decoded.samples, decoded.channels);
    let resampled = resample(&mono, decoded.sample_rate, target.sample_rate)?;

    // Duplicate the mono signal if the wire is multi-channel
    let channels = target.channels.max(1) as usize;
    let pcm: Vec<i16> = resampled
        .iter()
        .flat_map(|&s| std::iter::repeat(to_i16(s)).take(channels))
        .collect();

    Ok(match target.encoding {
        AudioEncoding::Mulaw => mulaw::encode(&pcm),
        AudioEncoding::Linear16 => pcm.iter().flat_map(|s| s.to_le_bytes()).collect(),
    })
}

/// Full pipeline: MP3 bytes in, wire bytes out
pub fn mp3_to_wire(mp3: Vec<u8>, target: AudioFormat) -> Result<Vec<u8>, SynthesisError> {
    let decoded = decode(mp3, "mp3")?;
    debug!(
        "Decoded {} samples ({}Hz, {} channels)",
        decoded.samples.len(),
        decoded.sample_rate,
        decoded.channels
    );
    encode(&decoded, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        let stereo = vec![0.5, -0.5, 1.0, 0.0];
        assert_eq!(downmix_to_mono(&stereo, 2), vec![0.0, 0.5]);
    }

    fn tone(freq: f32, rate: u32, seconds: f32) -> Vec<f32> {
        let len = (rate as f32 * seconds) as usize;
        (0..len)
            .map(|i| 0.8 * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn resample_output_length_follows_ratio() {
        let output = resample(&tone(440.0, 16000, 1.0), 16000, 8000).unwrap();
        assert_eq!(output.len(), 8000);
    }

    #[test]
    fn content_above_telephony_band_is_filtered() {
        // 6kHz cannot be represented at 8kHz; it must not alias to 2kHz
        let input = tone(6000.0, 44100, 1.0);
        let output = resample(&input, 44100, 8000).unwrap();

        assert!(rms(&input) > 0.5);
        assert!(rms(&output[400..7600]) < 0.05, "aliased rms {}", rms(&output));
    }

    #[test]
    fn speech_band_survives_resampling() {
        let output = resample(&tone(1000.0, 44100, 1.0), 44100, 8000).unwrap();
        let level = rms(&output[400..7600]);
        assert!((level - 0.8 / 2f32.sqrt()).abs() < 0.05, "rms {}", level);
    }

    #[test]
    fn encode_to_telephony_is_one_byte_per_sample() {
        let decoded = DecodedAudio {
            samples: vec![0.0; 44100 * 2],
            sample_rate: 44100,
            channels: 2,
        };
        let wire = encode(&decoded, AudioFormat::TELEPHONY).unwrap();
        assert_eq!(wire.len(), 8000);
        assert!(wire.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn garbage_input_is_a_transcode_error() {
        let result = mp3_to_wire(vec![0x42; 64], AudioFormat::TELEPHONY);
        assert!(result.is_err());
    }
}

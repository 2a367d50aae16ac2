// G.711 μ-law codec
//
// Telephony legs carry 8-bit μ-law. Synthesized speech is decoded to linear
// PCM first and then companded here before it goes on the wire.

const BIAS: i32 = 0x84;
const CLIP: i32 = 32635;

/// Compand one 16-bit linear sample to μ-law
pub fn encode_sample(sample: i16) -> u8 {
    let mut value = sample as i32;
    let sign = if value < 0 {
        value = -value;
        0x80
    } else {
        0x00
    };

    if value > CLIP {
        value = CLIP;
    }
    value += BIAS;

    // Segment is the position of the highest set bit above bit 7
    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && value & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = (value >> (exponent + 3)) & 0x0F;
    !(sign | (exponent << 4) | mantissa) as u8
}

pub fn encode(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| encode_sample(s)).collect()
}

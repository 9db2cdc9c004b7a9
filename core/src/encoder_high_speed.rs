//! 1500 baud encoder: bytes to cycle-length audio.
//!
//! A `ZERO` bit is one long sine cycle, a `ONE` one short cycle. Each
//! payload byte is framed by a start-bit zero cycle; the very first start
//! bit is stretched by a millisecond, which the decoder's cycle-length
//! window deliberately drops. The recording ends with an eased half-cycle
//! rather than a hard edge so playback hardware registers the final
//! transition.

use std::f64::consts::PI;

use crate::error::{Result, TapeError};
use crate::MIN_SAMPLE_RATE;

/// Long (ZERO) cycle length in seconds.
const ZERO_CYCLE_SECS: f64 = 0.000_72;

/// Short (ONE) cycle length in seconds.
const ONE_CYCLE_SECS: f64 = 0.000_34;

/// Extra stretch of the first payload byte's start cycle, in seconds.
const FIRST_START_STRETCH_SECS: f64 = 0.001;

/// Peak amplitude of synthesized cycles.
const CYCLE_AMPLITUDE: f64 = 16_384.0;

/// Header bytes before the sync byte.
const HEADER_BYTE_COUNT: usize = 256;

/// Byte value repeated through the header.
const HEADER_BYTE: u8 = 0x55;

/// Sync byte ending the header.
const SYNC_BYTE: u8 = 0x7F;

/// Silence synthesized before and after the recording, in seconds.
const LEAD_SILENCE_SECS: f64 = 0.5;

/// Synthesize a 1500 baud recording of `data` (header and start bits
/// included) at `sample_rate`, with half a second of silence on both ends.
pub fn encode_high_speed(data: &[u8], sample_rate: u32) -> Result<Vec<i16>> {
    if data.is_empty() {
        return Err(TapeError::EmptyPayload);
    }
    if sample_rate < MIN_SAMPLE_RATE {
        return Err(TapeError::InvalidSampleRate(sample_rate));
    }

    let zero_length = (ZERO_CYCLE_SECS * f64::from(sample_rate)).round() as usize;
    let one_length = (ONE_CYCLE_SECS * f64::from(sample_rate)).round() as usize;
    let stretch = (FIRST_START_STRETCH_SECS * f64::from(sample_rate)).round() as usize;
    let zero = generate_cycle(zero_length);
    let one = generate_cycle(one_length);
    let long_zero = generate_cycle(zero_length + stretch);
    let lead = (LEAD_SILENCE_SECS * f64::from(sample_rate)).round() as usize;

    let mut out = vec![0i16; lead];
    // Header carries no start bits.
    for _ in 0..HEADER_BYTE_COUNT {
        append_data_cycles(&mut out, HEADER_BYTE, &zero, &one);
    }
    append_data_cycles(&mut out, SYNC_BYTE, &zero, &one);

    let mut first = true;
    for &byte in data {
        if first {
            out.extend_from_slice(&long_zero);
            first = false;
        } else {
            out.extend_from_slice(&zero);
        }
        append_data_cycles(&mut out, byte, &zero, &one);
    }

    // Eased final transition: a slow half-cycle hump instead of a hard cut,
    // giving the last data cycle its closing edge.
    out.extend_from_slice(&generate_final_half_cycle(zero_length * 3));
    out.extend(std::iter::repeat(0i16).take(lead));

    Ok(out)
}

/// Remove the per-byte start-bit framing from a bit stream that still
/// carries it: the input is read MSB-first as groups of nine bits (start bit
/// plus eight data bits) and the data bits are re-packed into bytes.
pub fn strip_start_bits(framed: &[u8]) -> Vec<u8> {
    let total_bits = framed.len() * 8;
    let bit_at = |index: usize| (framed[index / 8] >> (7 - index % 8)) & 1;

    let mut out = Vec::with_capacity(framed.len() * 8 / 9);
    let mut cursor = 0;
    while cursor + 9 <= total_bits {
        cursor += 1; // start bit
        let mut value = 0u8;
        for _ in 0..8 {
            value = (value << 1) | bit_at(cursor);
            cursor += 1;
        }
        out.push(value);
    }
    out
}

/// One full sine cycle of the given length.
pub(crate) fn generate_cycle(length: usize) -> Vec<i16> {
    (0..length)
        .map(|i| {
            let phase = 2.0 * PI * (i as f64) / (length as f64);
            (phase.sin() * CYCLE_AMPLITUDE) as i16
        })
        .collect()
}

/// Append the eight data-bit cycles of `byte`, MSB first.
pub(crate) fn append_data_cycles(out: &mut Vec<i16>, byte: u8, zero: &[i16], one: &[i16]) {
    for bit in (0..8).rev() {
        if (byte >> bit) & 1 == 1 {
            out.extend_from_slice(one);
        } else {
            out.extend_from_slice(zero);
        }
    }
}

/// A single positive half-sine hump easing the signal down to silence.
fn generate_final_half_cycle(length: usize) -> Vec<i16> {
    (0..length)
        .map(|i| {
            let phase = PI * (i as f64) / (length as f64);
            (phase.sin() * CYCLE_AMPLITUDE) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_payload() {
        assert!(matches!(
            encode_high_speed(&[], 48_000),
            Err(TapeError::EmptyPayload)
        ));
    }

    #[test]
    fn test_rejects_tiny_sample_rate() {
        assert!(matches!(
            encode_high_speed(&[1], 100),
            Err(TapeError::InvalidSampleRate(100))
        ));
    }

    #[test]
    fn test_output_layout() {
        let rate = 48_000u32;
        let samples = encode_high_speed(&[0x00], rate).unwrap();
        let zero_len = 35; // 0.00072 * 48000 = 34.56
        let one_len = 16; // 0.00034 * 48000 = 16.32
        let lead = rate as usize / 2;
        // Header: 256 bytes of 0x55 (4 zero + 4 one cycles each) + 0x7F
        // (1 zero + 7 one cycles).
        let header = 256 * (4 * zero_len + 4 * one_len) + zero_len + 7 * one_len;
        // Payload 0x00: stretched start + 8 zero cycles; then the final hump.
        let payload = (zero_len + 48) + 8 * zero_len + 3 * zero_len;
        assert_eq!(samples.len(), 2 * lead + header + payload);
        assert!(samples[..lead].iter().all(|&s| s == 0));
    }

    #[test]
    fn test_final_hump_is_positive_and_eases_out() {
        let hump = generate_final_half_cycle(105);
        assert!(hump.iter().all(|&s| s >= 0));
        assert_eq!(hump[0], 0);
        assert!(hump[52] > 16_000, "hump too weak: {}", hump[52]);
        assert!(hump[104] < 600, "hump does not ease out: {}", hump[104]);
    }

    #[test]
    fn test_strip_start_bits_unframes_payload() {
        // Build a framed stream by hand: for each byte, a zero start bit
        // then the eight data bits.
        let payload = [0xA5u8, 0x01, 0xFE, 0x80];
        let mut bits: Vec<u8> = Vec::new();
        for &byte in &payload {
            bits.push(0);
            for bit in (0..8).rev() {
                bits.push((byte >> bit) & 1);
            }
        }
        // Pack into bytes MSB-first, zero-padded at the tail.
        let mut framed = Vec::new();
        for chunk in bits.chunks(8) {
            let mut value = 0u8;
            for (i, &b) in chunk.iter().enumerate() {
                value |= b << (7 - i);
            }
            framed.push(value);
        }

        assert_eq!(strip_start_bits(&framed), payload);
    }

    #[test]
    fn test_strip_start_bits_ignores_trailing_partial_group() {
        // A single byte holds 8 bits: not enough for one 9-bit group.
        assert!(strip_start_bits(&[0xFF]).is_empty());
        assert!(strip_start_bits(&[]).is_empty());
    }
}

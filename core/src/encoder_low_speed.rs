//! 500 baud encoder: bytes to clock/data pulse-pair audio.
//!
//! Each bit occupies two 1 ms windows: a clock pulse, then either a data
//! pulse (`ONE`) or silence (`ZERO`). The pulse is one sine period
//! compressed into the middle half of its window, which matches both
//! low-speed decoders' pulse-spacing expectations.

use std::f64::consts::PI;

use crate::error::{Result, TapeError};
use crate::{LOW_SPEED_SYNC_BYTE, MIN_SAMPLE_RATE};

/// Pulse window length in seconds (1 ms; two windows per bit at 500 baud).
const PULSE_WINDOW_SECS: f64 = 0.001;

/// Peak amplitude of synthesized pulses.
const PULSE_AMPLITUDE: f64 = 16_384.0;

/// Zero bytes written before the sync byte.
const HEADER_ZERO_BYTES: usize = 255;

/// Silence synthesized before and after the recording, in seconds.
const LEAD_SILENCE_SECS: f64 = 0.5;

/// Prefix `data` with the low-speed header: a run of zero bytes and the
/// sync byte a decoder locks onto.
pub fn wrap_low_speed(data: &[u8]) -> Vec<u8> {
    let mut wrapped = Vec::with_capacity(HEADER_ZERO_BYTES + 1 + data.len());
    wrapped.resize(HEADER_ZERO_BYTES, 0);
    wrapped.push(LOW_SPEED_SYNC_BYTE);
    wrapped.extend_from_slice(data);
    wrapped
}

/// Synthesize a 500 baud recording of `data` (header included) at
/// `sample_rate`, with half a second of silence on both ends.
pub fn encode_low_speed(data: &[u8], sample_rate: u32) -> Result<Vec<i16>> {
    if data.is_empty() {
        return Err(TapeError::EmptyPayload);
    }
    if sample_rate < MIN_SAMPLE_RATE {
        return Err(TapeError::InvalidSampleRate(sample_rate));
    }

    let window = (PULSE_WINDOW_SECS * f64::from(sample_rate)).round() as usize;
    let pulse = generate_pulse(window);
    let silence = vec![0i16; window];
    let lead = (LEAD_SILENCE_SECS * f64::from(sample_rate)).round() as usize;
    let wrapped = wrap_low_speed(data);

    let mut out = Vec::with_capacity(2 * lead + (wrapped.len() * 8 * 2 + 1) * window);
    out.resize(lead, 0);
    for &byte in &wrapped {
        for bit in (0..8).rev() {
            out.extend_from_slice(&pulse);
            if (byte >> bit) & 1 == 1 {
                out.extend_from_slice(&pulse);
            } else {
                out.extend_from_slice(&silence);
            }
        }
    }
    // One terminating clock pulse so a trailing ZERO bit still gets a
    // closing edge.
    out.extend_from_slice(&pulse);
    out.extend(std::iter::repeat(0i16).take(lead));

    Ok(out)
}

/// One sine period compressed into the middle half of a `length`-frame
/// window.
fn generate_pulse(length: usize) -> Vec<i16> {
    let mut pulse = vec![0i16; length];
    let cycle = length / 2;
    let offset = length / 4;
    for i in 0..cycle {
        let phase = 2.0 * PI * (i as f64) / (cycle as f64);
        pulse[offset + i] = (phase.sin() * PULSE_AMPLITUDE) as i16;
    }
    pulse
}

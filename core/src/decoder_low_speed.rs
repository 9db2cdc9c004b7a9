//! 500 baud pulse-position decoder.
//!
//! The encoding emits one clock pulse per bit cell and an extra mid-cell
//! pulse for a `ONE`, so the gap between consecutive pulses carries the bit:
//! a short gap is a `ONE`, a full cell is a `ZERO`. Because the extra pulse
//! keeps cell timing regular, the pulse immediately following a `ONE` is a
//! clock pulse that must be eaten (skipped) rather than classified; that
//! lookahead bookkeeping is the core subtlety here.

use log::{debug, warn};

use crate::bits::{BitRecord, BitType, ByteRecord};
use crate::decoder::DecoderState;
use crate::tape::Tape;
use crate::{scale_frames, LOW_SPEED_SYNC_BYTE};

/// Minimum frames between pulses at the reference rate. Also the dead window
/// during which the previous pulse's peak height is tracked.
const PULSE_WIDTH: usize = 22;

/// Gap threshold separating `ONE` (shorter) from `ZERO` (longer), in frames
/// at the reference rate.
const BIT_DETERMINATOR: usize = 68;

/// Pulse-free frames that end a detected program: a tenth of a second.
const END_OF_PROGRAM_SILENCE: usize = 4_800;

/// Zero bits required before the sync byte is trusted.
const MIN_HEADER_ZEROS: usize = 6;

/// Decoder for the 500 baud pulse-position encoding. Feed it one frame at a
/// time via [`handle_sample`](Self::handle_sample); it works on the tape's
/// pulse-accentuated samples.
pub struct LowSpeedDecoder<'a> {
    samples: &'a [i16],
    state: DecoderState,

    // Timing constants scaled to the tape's sample rate.
    pulse_width: usize,
    bit_determinator: usize,
    end_silence: usize,

    last_pulse_frame: usize,
    /// Peak amplitude tracked during the dead window after each pulse; the
    /// next pulse must reach a third of it.
    pulse_height: i32,
    eat_next_pulse: bool,
    /// The encoder does not clock the first post-sync pulse regularly, so
    /// one long eaten gap is forgiven right after detection.
    lenient_first_bit: bool,
    detected_zeros: usize,
    recent_bits: u32,
    bit_count: usize,
    current_byte_start: usize,

    binary: Vec<u8>,
    bits: Vec<BitRecord>,
    bytes: Vec<ByteRecord>,
}

impl<'a> LowSpeedDecoder<'a> {
    pub fn new(tape: &'a Tape) -> Self {
        Self {
            samples: &tape.accentuated,
            state: DecoderState::Undecided,
            pulse_width: scale_frames(PULSE_WIDTH, tape.sample_rate),
            bit_determinator: scale_frames(BIT_DETERMINATOR, tape.sample_rate),
            end_silence: scale_frames(END_OF_PROGRAM_SILENCE, tape.sample_rate),
            last_pulse_frame: 0,
            pulse_height: 0,
            eat_next_pulse: false,
            lenient_first_bit: false,
            detected_zeros: 0,
            recent_bits: 0,
            bit_count: 0,
            current_byte_start: 0,
            binary: Vec::new(),
            bits: Vec::new(),
            bytes: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        "low speed"
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn binary(&self) -> &[u8] {
        &self.binary
    }

    pub fn bits(&self) -> &[BitRecord] {
        &self.bits
    }

    pub fn bytes(&self) -> &[ByteRecord] {
        &self.bytes
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<BitRecord>, Vec<ByteRecord>) {
        (self.binary, self.bits, self.bytes)
    }

    pub fn handle_sample(&mut self, frame: usize) {
        let pulse = i32::from(self.samples[frame]);
        let time_diff = frame - self.last_pulse_frame;
        let pulsing = time_diff > self.pulse_width && pulse >= self.pulse_height / 3;

        // Keep tracking the current pulse's peak while inside its dead window.
        if time_diff < self.pulse_width {
            self.pulse_height = self.pulse_height.max(pulse);
        }

        if self.state == DecoderState::Detected && time_diff > self.end_silence {
            self.trim_dangling_bits();
            self.state = DecoderState::Finished;
            debug!("low speed: program finished at frame {}", frame);
            return;
        }

        if !pulsing {
            return;
        }

        let bit = time_diff < self.bit_determinator;
        if self.eat_next_pulse {
            // This pulse is the clock pulse following a ONE; skip it. A long
            // gap here means the tape misplaced it, which is only forgiven
            // for the first post-sync bit.
            if self.state == DecoderState::Detected && !bit && !self.lenient_first_bit {
                warn!("low speed: missing clock pulse near frame {}", frame);
                self.bits
                    .push(BitRecord::new(self.last_pulse_frame, frame, BitType::Bad));
            }
            self.eat_next_pulse = false;
            self.lenient_first_bit = false;
        } else if self.state == DecoderState::Undecided
            && bit
            && self.detected_zeros < MIN_HEADER_ZEROS
        {
            // Stray ONE before a credible zero run; restart the header hunt.
            self.detected_zeros = 0;
        } else {
            if bit {
                self.eat_next_pulse = true;
            } else {
                self.detected_zeros += 1;
            }
            self.recent_bits = (self.recent_bits << 1) | u32::from(bit);

            if self.state == DecoderState::Undecided {
                if self.recent_bits == u32::from(LOW_SPEED_SYNC_BYTE) {
                    debug!("low speed: sync byte found at frame {}", frame);
                    self.state = DecoderState::Detected;
                    self.bit_count = 0;
                    self.lenient_first_bit = true;
                }
            } else {
                let bit_type = if bit { BitType::One } else { BitType::Zero };
                self.bits
                    .push(BitRecord::new(self.last_pulse_frame, frame, bit_type));
                if self.bit_count == 0 {
                    self.current_byte_start = self.last_pulse_frame;
                }
                self.bit_count += 1;
                if self.bit_count == 8 {
                    let value = (self.recent_bits & 0xFF) as u8;
                    self.binary.push(value);
                    self.bytes
                        .push(ByteRecord::new(value, self.current_byte_start, frame));
                    self.bit_count = 0;
                }
            }
        }

        self.last_pulse_frame = frame;
        self.pulse_height = 0;
    }

    /// Drop provenance for the incomplete trailing byte so byte framing stays
    /// consistent: every surviving data bit belongs to a framed byte.
    fn trim_dangling_bits(&mut self) {
        while self.bit_count > 0 {
            match self.bits.pop() {
                Some(record) if record.bit_type == BitType::Bad => {}
                Some(_) => self.bit_count -= 1,
                None => break,
            }
        }
        self.bit_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder_low_speed::encode_low_speed;

    fn decode_fully<'a>(tape: &'a Tape) -> LowSpeedDecoder<'a> {
        let mut decoder = LowSpeedDecoder::new(tape);
        for frame in 0..tape.len() {
            if decoder.state() == DecoderState::Finished {
                break;
            }
            decoder.handle_sample(frame);
        }
        decoder
    }

    #[test]
    fn test_decodes_simple_payload() {
        // Scenario: three known bytes at 44.1 kHz survive the round trip.
        let samples = encode_low_speed(&[0x01, 0x02, 0x03], 44_100).unwrap();
        let tape = Tape::new(samples, 44_100);
        let decoder = decode_fully(&tape);

        assert_eq!(decoder.state(), DecoderState::Finished);
        assert_eq!(decoder.binary(), &[0x01, 0x02, 0x03]);
        assert_eq!(decoder.bytes().len(), 3);
    }

    #[test]
    fn test_silence_stays_undecided() {
        let tape = Tape::new(vec![0i16; 48_000], 48_000);
        let decoder = decode_fully(&tape);
        assert_eq!(decoder.state(), DecoderState::Undecided);
        assert!(decoder.binary().is_empty());
    }

    #[test]
    fn test_byte_framing_matches_data_bits() {
        let samples = encode_low_speed(&[0xDE, 0xAD, 0xBE, 0xEF], 48_000).unwrap();
        let tape = Tape::new(samples, 48_000);
        let decoder = decode_fully(&tape);

        assert_eq!(decoder.state(), DecoderState::Finished);
        let data_bits = decoder.bits().iter().filter(|b| b.bit_type.is_data()).count();
        assert_eq!(decoder.bytes().len() * 8, data_bits);
    }

    #[test]
    fn test_shifted_data_pulse_yields_one_bad_bit() {
        // Scenario: nudge one ONE bit's data pulse early. The bit still
        // classifies as ONE, but the following eaten clock pulse now arrives
        // past the bit determinator and is flagged, exactly once.
        let rate = 44_100u32;
        let payload = [0x55u8, 0xFF, 0xAA];
        let mut samples = encode_low_speed(&payload, rate).unwrap();

        let cell = (0.001 * f64::from(rate)).round() as usize; // 44 frames
        let leading_silence = rate as usize / 2;
        // Bit 2 of payload byte 1 (0xFF): cell index counts the 255 zero
        // bytes and the sync byte first.
        let cell_index = (256 + 1) * 8 + 2;
        let data_start = leading_silence + cell_index * 2 * cell + cell;

        // Move the data pulse itself (the middle half of its window) 21
        // frames earlier.
        let shift = 21;
        let pulse_start = data_start + cell / 4;
        let pulse_end = pulse_start + cell / 2;
        let pulse: Vec<i16> = samples[pulse_start..pulse_end].to_vec();
        samples[pulse_start..pulse_end].fill(0);
        samples[pulse_start - shift..pulse_end - shift].copy_from_slice(&pulse);

        let tape = Tape::new(samples, rate);
        let decoder = decode_fully(&tape);

        assert_eq!(decoder.state(), DecoderState::Finished);
        assert_eq!(decoder.binary(), &payload, "payload bytes were disturbed");
        let bad: Vec<&BitRecord> = decoder
            .bits()
            .iter()
            .filter(|b| b.bit_type == BitType::Bad)
            .collect();
        assert_eq!(bad.len(), 1, "expected exactly one flagged bit");
        // The flagged gap ends at the eaten clock pulse of the next cell.
        let expected_end = data_start + cell;
        let delta = bad[0].end_frame.abs_diff(expected_end);
        assert!(delta < cell, "flagged bit at unexpected position");
    }

    #[test]
    fn test_high_speed_audio_is_rejected() {
        let samples = crate::encoder_high_speed::encode_high_speed(&[0xA5, 0x0F], 48_000).unwrap();
        let tape = Tape::new(samples, 48_000);
        let decoder = decode_fully(&tape);
        assert_eq!(decoder.state(), DecoderState::Undecided);
    }
}

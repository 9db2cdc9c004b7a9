//! 1500 baud cycle-length decoder.
//!
//! Bits are carried by the length of full signal cycles: a short cycle is a
//! `ONE`, a long cycle a `ZERO`. The decoder tracks sign changes of the
//! filtered samples and measures the distance between rising crossings; only
//! cycle lengths inside an empirically valid window count as bits. Each byte
//! is framed by an implicit start bit that must read as zero.

use log::{debug, warn};

use crate::bits::{BitRecord, BitType, ByteRecord};
use crate::decoder::DecoderState;
use crate::tape::Tape;
use crate::{scale_frames, HIGH_SPEED_SYNC_PATTERN};

/// Amplitude a sample must exceed (either polarity) to count for sign
/// tracking. Not scaled; it is an amplitude, not a time span.
const CROSSING_THRESHOLD: i16 = 500;

/// Shortest believable cycle at the reference rate, exclusive.
const MIN_CYCLE: usize = 7;

/// Longest believable cycle at the reference rate, exclusive.
const MAX_CYCLE: usize = 44;

/// Cycles shorter than this are `ONE`, longer are `ZERO` (reference rate).
const CYCLE_DETERMINATOR: usize = 22;

/// A cycle longer than this (~1.4 ms) after data has been seen ends the
/// program.
const END_GAP: usize = 66;

/// Frames without any crossing that end a detected program.
const MIN_CROSSING_SILENCE: usize = 1_000;

/// Decoder for the 1500 baud cycle-length encoding; works on the tape's
/// high-pass filtered samples.
pub struct HighSpeedDecoder<'a> {
    samples: &'a [i16],
    state: DecoderState,

    min_cycle: usize,
    max_cycle: usize,
    cycle_determinator: usize,
    end_gap: usize,
    min_crossing_silence: usize,

    /// -1, 0 or 1; zero until the signal first exceeds the threshold.
    old_sign: i32,
    cycle_size: usize,
    last_crossing_frame: usize,
    recent_bits: u32,
    bit_count: usize,
    current_byte_start: usize,

    binary: Vec<u8>,
    bits: Vec<BitRecord>,
    bytes: Vec<ByteRecord>,
}

impl<'a> HighSpeedDecoder<'a> {
    pub fn new(tape: &'a Tape) -> Self {
        Self {
            samples: &tape.filtered,
            state: DecoderState::Undecided,
            min_cycle: scale_frames(MIN_CYCLE, tape.sample_rate),
            max_cycle: scale_frames(MAX_CYCLE, tape.sample_rate),
            cycle_determinator: scale_frames(CYCLE_DETERMINATOR, tape.sample_rate),
            end_gap: scale_frames(END_GAP, tape.sample_rate),
            min_crossing_silence: scale_frames(MIN_CROSSING_SILENCE, tape.sample_rate),
            old_sign: 0,
            cycle_size: 0,
            last_crossing_frame: 0,
            recent_bits: 0,
            bit_count: 0,
            current_byte_start: 0,
            binary: Vec::new(),
            bits: Vec::new(),
            bytes: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        "high speed"
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
        let sample = self.samples[frame];
        let new_sign = if sample > CROSSING_THRESHOLD {
            1
        } else if sample < -CROSSING_THRESHOLD {
            -1
        } else {
            0
        };

        if self.old_sign != 0 && new_sign != 0 && self.old_sign != new_sign {
            self.last_crossing_frame = frame;
            if self.old_sign == -1 {
                // Rising crossing: one full cycle just ended.
                self.process_cycle(frame);
                self.cycle_size = 0;
            }
        }
        if new_sign != 0 {
            self.old_sign = new_sign;
        }
        self.cycle_size += 1;

        if self.state == DecoderState::Detected
            && frame - self.last_crossing_frame > self.min_crossing_silence
        {
            self.trim_dangling_bits();
            self.state = DecoderState::Finished;
            debug!("high speed: program finished (silence) at frame {}", frame);
        }
    }

    fn process_cycle(&mut self, frame: usize) {
        if self.cycle_size > self.min_cycle && self.cycle_size < self.max_cycle {
            let bit = self.cycle_size < self.cycle_determinator;
            self.recent_bits = (self.recent_bits << 1) | u32::from(bit);

            if self.state == DecoderState::Detected {
                self.bit_count += 1;
                let start_frame = frame - self.cycle_size;
                if self.bit_count == 1 {
                    // Start bit; must be zero. The very first payload byte's
                    // start cycle is stretched past max_cycle by the encoder,
                    // so it never reaches here.
                    if bit {
                        warn!("high speed: bad start bit at frame {}", frame);
                        self.bits
                            .push(BitRecord::new(start_frame, frame, BitType::Bad));
                        self.state = DecoderState::Error;
                        return;
                    }
                    self.bits
                        .push(BitRecord::new(start_frame, frame, BitType::Start));
                } else {
                    if self.bit_count == 2 {
                        self.current_byte_start = start_frame;
                    }
                    let bit_type = if bit { BitType::One } else { BitType::Zero };
                    self.bits
                        .push(BitRecord::new(start_frame, frame, bit_type));
                    if self.bit_count == 9 {
                        let value = (self.recent_bits & 0xFF) as u8;
                        self.binary.push(value);
                        self.bytes
                            .push(ByteRecord::new(value, self.current_byte_start, frame));
                        self.bit_count = 0;
                    }
                }
            } else if self.state == DecoderState::Undecided
                && self.recent_bits == HIGH_SPEED_SYNC_PATTERN
            {
                debug!("high speed: header matched at frame {}", frame);
                self.state = DecoderState::Detected;
                // The first payload byte's start bit is the long cycle the
                // range filter drops, so count it as already consumed.
                self.bit_count = 1;
                self.recent_bits = 0;
            }
        } else if self.state == DecoderState::Detected
            && !self.binary.is_empty()
            && self.cycle_size > self.end_gap
        {
            self.trim_dangling_bits();
            self.state = DecoderState::Finished;
            debug!("high speed: program finished (long gap) at frame {}", frame);
        }
    }

    /// Drop the records of an incomplete trailing byte (its start bit
    /// included) so surviving data bits always belong to framed bytes.
    fn trim_dangling_bits(&mut self) {
        for _ in 0..self.bit_count {
            self.bits.pop();
        }
        self.bit_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder_high_speed::{append_data_cycles, encode_high_speed, generate_cycle};

    fn decode_fully<'a>(tape: &'a Tape) -> HighSpeedDecoder<'a> {
        let mut decoder = HighSpeedDecoder::new(tape);
        for frame in 0..tape.len() {
            match decoder.state() {
                DecoderState::Finished | DecoderState::Error => break,
                _ => decoder.handle_sample(frame),
            }
        }
        decoder
    }

    #[test]
    fn test_decodes_simple_payload() {
        // Scenario: two known bytes at 44.1 kHz survive the round trip.
        let samples = encode_high_speed(&[0xAA, 0x55], 44_100).unwrap();
        let tape = Tape::new(samples, 44_100);
        let decoder = decode_fully(&tape);

        assert_eq!(decoder.state(), DecoderState::Finished);
        assert_eq!(decoder.binary(), &[0xAA, 0x55]);
    }

    #[test]
    fn test_silence_stays_undecided() {
        let tape = Tape::new(vec![0i16; 48_000], 48_000);
        let decoder = decode_fully(&tape);
        assert_eq!(decoder.state(), DecoderState::Undecided);
    }

    #[test]
    fn test_byte_framing_counts_only_data_bits() {
        let samples = encode_high_speed(&[0x00, 0xFF, 0x0F, 0xF0], 48_000).unwrap();
        let tape = Tape::new(samples, 48_000);
        let decoder = decode_fully(&tape);

        assert_eq!(decoder.state(), DecoderState::Finished);
        let data_bits = decoder.bits().iter().filter(|b| b.bit_type.is_data()).count();
        assert_eq!(decoder.bytes().len() * 8, data_bits);
        // Start bits exist but are not data: one per byte after the first.
        let start_bits = decoder
            .bits()
            .iter()
            .filter(|b| b.bit_type == BitType::Start)
            .count();
        assert_eq!(start_bits, 3);
    }

    #[test]
    fn test_bad_start_bit_moves_to_error() {
        // Hand-build a stream whose second payload byte carries a ONE where
        // its start bit belongs.
        let rate = 48_000u32;
        let zero_len = (0.00072 * f64::from(rate)).round() as usize;
        let one_len = (0.00034 * f64::from(rate)).round() as usize;
        let zero = generate_cycle(zero_len);
        let one = generate_cycle(one_len);
        let long_zero = generate_cycle(zero_len + rate as usize / 1000);

        let mut samples = vec![0i16; 2_000];
        for _ in 0..256 {
            append_data_cycles(&mut samples, 0x55, &zero, &one);
        }
        append_data_cycles(&mut samples, 0x7F, &zero, &one);
        // First payload byte: stretched start cycle, then data.
        samples.extend_from_slice(&long_zero);
        append_data_cycles(&mut samples, 0xAA, &zero, &one);
        // Second payload byte: corrupt start bit (short cycle = ONE).
        samples.extend_from_slice(&one);
        append_data_cycles(&mut samples, 0x12, &zero, &one);
        samples.extend(std::iter::repeat(0i16).take(2_000));

        let tape = Tape::new(samples, rate);
        let decoder = decode_fully(&tape);

        assert_eq!(decoder.state(), DecoderState::Error);
        assert_eq!(decoder.binary(), &[0xAA], "bytes before the fault survive");
        assert_eq!(
            decoder.bits().last().map(|b| b.bit_type),
            Some(BitType::Bad)
        );
    }

    #[test]
    fn test_low_speed_audio_is_rejected() {
        let samples = crate::encoder_low_speed::encode_low_speed(&[0x42, 0x99], 48_000).unwrap();
        let tape = Tape::new(samples, 48_000);
        let decoder = decode_fully(&tape);
        assert_eq!(decoder.state(), DecoderState::Undecided);
    }
}

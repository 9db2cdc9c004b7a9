//! Clock/data pulse-pair decoder, the alternate take on the 500 baud
//! low-speed encoding.
//!
//! Every bit cell starts with a clock pulse; a data pulse half a period
//! later means `ONE`, its absence means `ZERO`. Instead of thresholding a
//! running peak like the pulse-position decoder, this variant probes a small
//! window around each expected pulse position and classifies the local swing
//! as `PULSE`, `NOISE` or `SILENCE`. A candidate lock is only trusted after
//! proofing ~200 consecutive clock positions, which rejects spurious sync
//! matches in noise.

use log::{debug, warn};

use crate::bits::{BitRecord, BitType, ByteRecord};
use crate::decoder::DecoderState;
use crate::tape::Tape;
use crate::LOW_SPEED_SYNC_BYTE;

/// Bit rate of the encoding.
const BAUD: u32 = 500;

/// Swing a probe window must exceed before calibration takes over.
const DEFAULT_PEAK_THRESHOLD: i32 = 3_000;

/// Clock positions that must all hold a pulse before a lock is trusted.
const PROOF_PULSE_COUNT: usize = 200;

/// Periods skipped forward after a failed acquisition attempt.
const SKIP_AHEAD_PERIODS: usize = 50;

/// Periods searched ahead for the one tolerated late clock pulse.
const LATE_PULSE_PERIODS: usize = 6;

/// Zero bytes that mark a swallowed next-copy header when followed by the
/// sync byte.
const HEADER_ZERO_RUN: usize = 250;

/// Probe outcome for one expected pulse position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseOutcome {
    /// Clean excursion with edges pulled away from the peak.
    Pulse,
    /// Swing present but inconclusive.
    Noise,
    /// No meaningful swing; likely a tape gap.
    Silence,
}

/// Result of probing for a pulse.
#[derive(Debug, Clone, Copy)]
struct Pulse {
    outcome: PulseOutcome,
    /// Peak sample value (signed; sign gives the pulse polarity).
    value: i16,
    /// Frame of the peak.
    frame: usize,
    /// Max minus min over the probe window.
    range: i32,
}

impl Pulse {
    fn silence() -> Self {
        Self {
            outcome: PulseOutcome::Silence,
            value: 0,
            frame: 0,
            range: 0,
        }
    }

    fn noise() -> Self {
        Self {
            outcome: PulseOutcome::Noise,
            ..Self::silence()
        }
    }
}

/// Decoder for the clock/data pulse-pair variant; works on the tape's
/// pulse-accentuated samples.
pub struct LowSpeedAlternateDecoder<'a> {
    samples: &'a [i16],
    state: DecoderState,

    period: usize,
    half_period: usize,
    quarter_period: usize,
    clock_search_radius: usize,
    data_search_radius: usize,

    /// Re-calibrated to a quarter of each accepted clock pulse's swing.
    peak_threshold: i32,
    /// Next frame worth scanning while undecided; earlier frames return
    /// immediately so the race loop stays cheap.
    next_scan_frame: usize,
    /// Frame the decoded program ends at, once known.
    end_frame: usize,

    binary: Vec<u8>,
    bits: Vec<BitRecord>,
    bytes: Vec<ByteRecord>,
}

impl<'a> LowSpeedAlternateDecoder<'a> {
    pub fn new(tape: &'a Tape) -> Self {
        let period = (f64::from(tape.sample_rate) / f64::from(BAUD)).round() as usize;
        Self {
            samples: &tape.accentuated,
            state: DecoderState::Undecided,
            period,
            half_period: period / 2,
            quarter_period: period / 4,
            clock_search_radius: ((period as f64) * 0.3).round() as usize,
            data_search_radius: ((period as f64) * 0.15).round() as usize,
            peak_threshold: DEFAULT_PEAK_THRESHOLD,
            next_scan_frame: 0,
            end_frame: 0,
            binary: Vec::new(),
            bits: Vec::new(),
            bytes: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        "low speed alternate"
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
        match self.state {
            DecoderState::Undecided => {
                if frame < self.next_scan_frame {
                    return;
                }
                match self.find_pulse_near(frame) {
                    None => {
                        self.next_scan_frame = frame + self.period * SKIP_AHEAD_PERIODS;
                    }
                    Some(pulse) => {
                        self.peak_threshold = DEFAULT_PEAK_THRESHOLD;
                        if self.proof_pulse_distance(pulse.frame) {
                            self.load_data(pulse.frame);
                            if !self.binary.is_empty() {
                                debug!(
                                    "low speed alternate: locked at frame {}, {} bytes",
                                    pulse.frame,
                                    self.binary.len()
                                );
                                self.state = DecoderState::Detected;
                                return;
                            }
                            // Proofed spacing but no sync byte followed.
                            self.bits.clear();
                            self.bytes.clear();
                        }
                        self.next_scan_frame = pulse.frame + self.period * SKIP_AHEAD_PERIODS;
                    }
                }
            }
            DecoderState::Detected => {
                if frame >= self.end_frame {
                    self.state = DecoderState::Finished;
                }
            }
            _ => {}
        }
    }

    /// Probe a window of `radius` frames either side of `frame` for a pulse.
    fn is_pulse_at(&self, frame: usize, peak_threshold: i32, radius: usize) -> Pulse {
        let len = self.samples.len();
        let start = frame.saturating_sub(radius);
        if len == 0 || start >= len {
            return Pulse::silence();
        }
        let end = (frame + radius).min(len - 1);

        let mut min_value = self.samples[start];
        let mut max_value = self.samples[start];
        let mut min_frame = start;
        let mut max_frame = start;
        for (i, &s) in self.samples[start..=end].iter().enumerate() {
            if s < min_value {
                min_value = s;
                min_frame = start + i;
            }
            if s > max_value {
                max_value = s;
                max_frame = start + i;
            }
        }

        let range = i32::from(max_value) - i32::from(min_value);
        if range > peak_threshold {
            // A real pulse peaks inside the window: both window edges must
            // have pulled away from the extreme.
            let pull = peak_threshold / 4;
            let first = i32::from(self.samples[start]);
            let last = i32::from(self.samples[end]);
            let mut found_pos =
                first < i32::from(max_value) - pull && last < i32::from(max_value) - pull;
            let mut found_neg =
                first > i32::from(min_value) + pull && last > i32::from(min_value) + pull;
            if found_pos && found_neg {
                if i32::from(max_value) >= -i32::from(min_value) {
                    found_neg = false;
                } else {
                    found_pos = false;
                }
            }
            if found_pos {
                return Pulse {
                    outcome: PulseOutcome::Pulse,
                    value: max_value,
                    frame: max_frame,
                    range,
                };
            }
            if found_neg {
                return Pulse {
                    outcome: PulseOutcome::Pulse,
                    value: min_value,
                    frame: min_frame,
                    range,
                };
            }
            return Pulse::noise();
        }
        if range > peak_threshold / 2 {
            Pulse::noise()
        } else {
            Pulse::silence()
        }
    }

    /// Scan up to two periods from `frame` for the strongest clean pulse.
    fn find_pulse_near(&self, frame: usize) -> Option<Pulse> {
        let mut best: Option<Pulse> = None;
        let mut offset = 0;
        while offset < self.period * 2 {
            let probe = self.is_pulse_at(
                frame + offset,
                DEFAULT_PEAK_THRESHOLD,
                self.clock_search_radius,
            );
            if probe.outcome == PulseOutcome::Pulse
                && best.map_or(true, |b| probe.value.unsigned_abs() > b.value.unsigned_abs())
            {
                best = Some(probe);
            }
            offset += self.clock_search_radius.max(1);
        }
        best
    }

    /// Verify that a run of clock positions one period apart all hold a
    /// pulse, with nothing in the data slots. Re-calibrates the peak
    /// threshold from each accepted pulse along the way.
    fn proof_pulse_distance(&mut self, start_frame: usize) -> bool {
        let mut frame = start_frame;
        for _ in 0..PROOF_PULSE_COUNT {
            let clock = self.is_pulse_at(frame, self.peak_threshold, self.clock_search_radius);
            if clock.outcome != PulseOutcome::Pulse {
                return false;
            }
            let data = self.is_pulse_at(
                clock.frame + self.half_period,
                clock.range / 2,
                self.data_search_radius,
            );
            if data.outcome == PulseOutcome::Pulse {
                return false;
            }
            self.peak_threshold = clock.range / 4;
            frame = clock.frame + self.period;
        }
        true
    }

    /// Find a clock pulse that arrived late, up to a few periods past where
    /// it was expected. Polarity must match the previous clock pulse.
    fn find_next_close_pulse(&self, frame: usize, positive: bool) -> Option<Pulse> {
        let mut offset = 0;
        while offset < self.period * LATE_PULSE_PERIODS {
            let probe =
                self.is_pulse_at(frame + offset, self.peak_threshold, self.clock_search_radius);
            if probe.outcome == PulseOutcome::Pulse && (probe.value > 0) == positive {
                return Some(probe);
            }
            offset += self.clock_search_radius.max(1);
        }
        None
    }

    /// Read the bit of the cell following `frame` (a clock pulse position).
    /// Returns the bit value and the clock probe result; the caller advances
    /// to the returned clock's frame.
    fn read_bit(&self, frame: usize, allow_late: bool) -> (bool, Pulse) {
        let mut clock =
            self.is_pulse_at(frame + self.period, self.peak_threshold, self.clock_search_radius);
        if clock.outcome != PulseOutcome::Pulse {
            if !allow_late {
                return (false, clock);
            }
            let positive = self.samples.get(frame).copied().unwrap_or(0) > 0;
            match self.find_next_close_pulse(frame + self.period, positive) {
                Some(late) => clock = late,
                None => return (false, clock),
            }
        }
        let data = self.is_pulse_at(
            clock.frame + self.half_period,
            self.peak_threshold,
            self.data_search_radius,
        );
        (data.outcome == PulseOutcome::Pulse, clock)
    }

    /// Decode from a proofed clock pulse to the end of the program, filling
    /// the output accumulators and `end_frame`.
    fn load_data(&mut self, start_frame: usize) {
        let mut frame = start_frame;
        // Primed with ones so header zeros must flush it before the sync
        // byte can match.
        let mut recent_bits: u32 = 0xFFFF_FFFF;
        let mut found_sync = false;
        let mut late_clock = false;
        let mut bit_count = 0usize;
        let mut byte_start = 0usize;
        let mut zero_run = 0usize;
        let mut run_byte_mark = 0usize;
        let mut run_bit_mark = 0usize;
        let mut run_frame = 0usize;

        loop {
            let allow_late = std::mem::take(&mut late_clock);
            let (bit, clock) = self.read_bit(frame, allow_late);
            if clock.outcome == PulseOutcome::Silence {
                break;
            }

            let (next_frame, bit_type) = if clock.outcome == PulseOutcome::Noise {
                warn!("low speed alternate: noisy clock slot near frame {}", frame);
                (frame + self.period, BitType::Bad)
            } else {
                self.peak_threshold = clock.range / 4;
                let bit_type = if bit { BitType::One } else { BitType::Zero };
                (clock.frame, bit_type)
            };

            recent_bits = (recent_bits << 1) | u32::from(bit);

            if found_sync {
                let start = next_frame.saturating_sub(self.quarter_period);
                let end = next_frame + self.period - self.quarter_period;
                self.bits.push(BitRecord::new(start, end, bit_type));
                if bit_count == 0 {
                    byte_start = start;
                }
                bit_count += 1;
                if bit_count == 8 {
                    let value = (recent_bits & 0xFF) as u8;
                    if value == LOW_SPEED_SYNC_BYTE && zero_run >= HEADER_ZERO_RUN {
                        // We ran straight into the next copy's header; give
                        // its bytes back and end here.
                        debug!(
                            "low speed alternate: next-copy header at frame {}, rewinding",
                            frame
                        );
                        self.binary.truncate(run_byte_mark);
                        self.bytes.truncate(run_byte_mark);
                        self.bits.truncate(run_bit_mark);
                        frame = run_frame;
                        break;
                    }
                    if value == 0 {
                        if zero_run == 0 {
                            run_byte_mark = self.binary.len();
                            run_bit_mark = self.bits.len() - 8;
                            run_frame = frame;
                        }
                        zero_run += 1;
                    } else {
                        zero_run = 0;
                    }
                    self.binary.push(value);
                    self.bytes.push(ByteRecord::new(value, byte_start, end));
                    bit_count = 0;
                }
            } else if recent_bits == u32::from(LOW_SPEED_SYNC_BYTE) {
                debug!("low speed alternate: sync byte at frame {}", next_frame);
                found_sync = true;
                late_clock = true;
                bit_count = 0;
            }

            frame = next_frame;
        }

        // Every surviving record must belong to a framed byte; this drops
        // the dangling terminating-clock bit and any trailing bad reads.
        self.bits.truncate(self.binary.len() * 8);
        self.end_frame = frame;
    }
}

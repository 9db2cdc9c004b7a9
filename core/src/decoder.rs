//! Multi-decoder race orchestrator.
//!
//! Every scan position gets a fresh set of decoder variants. They are fed
//! the same samples in lock-step until exactly one leaves `Undecided`; that
//! survivor is driven to a terminal state, a [`Program`] is materialized,
//! and the scan resumes right after it. The race is simulated parallelism:
//! one frame per variant per loop iteration, in a fixed order, over the same
//! read-only sample arrays.

use log::{debug, info};

use crate::bits::{BitRecord, ByteRecord};
use crate::decoder_high_speed::HighSpeedDecoder;
use crate::decoder_low_speed::LowSpeedDecoder;
use crate::decoder_low_speed_alt::LowSpeedAlternateDecoder;
use crate::frame_to_timestamp;
use crate::program::Program;
use crate::tape::Tape;

/// Seconds of lead-in beyond which a detection starts a new track instead
/// of another copy on the current one.
const NEW_TRACK_GAP_SECS: f64 = 10.0;

/// Decoder lifecycle. `Undecided -> Detected -> {Finished | Error}` is the
/// only legal path; no state is revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Has not recognized any encoding yet.
    Undecided,
    /// Locked onto a header, now framing data.
    Detected,
    /// Clean end of program.
    Finished,
    /// Framing failure mid-program; partial output preserved.
    Error,
}

/// One racing decoder variant. The set of encodings is closed, so this is a
/// plain enum rather than trait objects; the variant order here is also the
/// arbitration order when two variants detect on the same sample.
enum Candidate<'a> {
    LowSpeed(LowSpeedDecoder<'a>),
    HighSpeed(HighSpeedDecoder<'a>),
    LowSpeedAlternate(LowSpeedAlternateDecoder<'a>),
}

impl<'a> Candidate<'a> {
    fn all(tape: &'a Tape) -> Vec<Candidate<'a>> {
        vec![
            Candidate::LowSpeed(LowSpeedDecoder::new(tape)),
            Candidate::HighSpeed(HighSpeedDecoder::new(tape)),
            Candidate::LowSpeedAlternate(LowSpeedAlternateDecoder::new(tape)),
        ]
    }

    fn name(&self) -> &'static str {
        match self {
            Candidate::LowSpeed(d) => d.name(),
            Candidate::HighSpeed(d) => d.name(),
            Candidate::LowSpeedAlternate(d) => d.name(),
        }
    }

    fn state(&self) -> DecoderState {
        match self {
            Candidate::LowSpeed(d) => d.state(),
            Candidate::HighSpeed(d) => d.state(),
            Candidate::LowSpeedAlternate(d) => d.state(),
        }
    }

    fn handle_sample(&mut self, frame: usize) {
        match self {
            Candidate::LowSpeed(d) => d.handle_sample(frame),
            Candidate::HighSpeed(d) => d.handle_sample(frame),
            Candidate::LowSpeedAlternate(d) => d.handle_sample(frame),
        }
    }

    fn into_parts(self) -> (Vec<u8>, Vec<BitRecord>, Vec<ByteRecord>) {
        match self {
            Candidate::LowSpeed(d) => d.into_parts(),
            Candidate::HighSpeed(d) => d.into_parts(),
            Candidate::LowSpeedAlternate(d) => d.into_parts(),
        }
    }
}

/// Scans a whole tape and segments it into programs.
pub struct Decoder<'a> {
    tape: &'a Tape,
}

impl<'a> Decoder<'a> {
    pub fn new(tape: &'a Tape) -> Self {
        Self { tape }
    }

    /// Run the race over the full recording and return every program found,
    /// in tape order. Partial decodes still running at end of tape are
    /// discarded.
    pub fn decode(&self) -> Vec<Program> {
        let len = self.tape.len();
        let rate = self.tape.sample_rate;
        let mut programs = Vec::new();
        let mut track_number = 0u32;
        let mut copy_number = 0u32;
        let mut frame = 0usize;

        while frame < len {
            let scan_start = frame;
            let mut candidates = Candidate::all(self.tape);

            // Race: lock-step until one candidate leaves Undecided.
            let mut winner: Option<Candidate<'a>> = None;
            while frame < len {
                for candidate in candidates.iter_mut() {
                    candidate.handle_sample(frame);
                }
                if let Some(index) = candidates
                    .iter()
                    .position(|c| c.state() != DecoderState::Undecided)
                {
                    winner = Some(candidates.swap_remove(index));
                    break;
                }
                frame += 1;
            }
            let Some(mut winner) = winner else {
                // End of tape with nothing detected: no more programs.
                break;
            };

            let detect_frame = frame;
            let lead_secs = (detect_frame - scan_start) as f64 / f64::from(rate);
            if programs.is_empty() || lead_secs > NEW_TRACK_GAP_SECS {
                track_number += 1;
                copy_number = 1;
            } else {
                copy_number += 1;
            }
            info!(
                "{} decoder detected track {}, copy {} at {}",
                winner.name(),
                track_number,
                copy_number,
                frame_to_timestamp(detect_frame, rate)
            );

            // Drive the survivor to a terminal state.
            while winner.state() == DecoderState::Detected {
                frame += 1;
                if frame >= len {
                    break;
                }
                winner.handle_sample(frame);
            }
            if winner.state() == DecoderState::Detected {
                debug!("tape ended mid-program; discarding partial decode");
                break;
            }

            let end_frame = frame.min(len.saturating_sub(1));
            let outcome = winner.state();
            let decoder_name = winner.name();
            let (binary, bits, bytes) = winner.into_parts();
            info!(
                "track {}, copy {}: {} bytes, {:?} at {}",
                track_number,
                copy_number,
                binary.len(),
                outcome,
                frame_to_timestamp(end_frame, rate)
            );
            programs.push(Program {
                track_number,
                copy_number,
                start_frame: detect_frame,
                end_frame,
                decoder_name,
                outcome,
                binary,
                bits,
                bytes,
            });

            frame = end_frame + 1;
        }

        programs
    }
}

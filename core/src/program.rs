//! The decode result: a recovered binary plus its bit/byte provenance.

use crate::bits::{BitRecord, BitType, ByteRecord};
use crate::decoder::DecoderState;
use crate::frame_to_timestamp;

/// One recovered program. Immutable once materialized by the orchestrator.
///
/// Track/copy identity encodes tape topology: consecutive programs separated
/// by a short gap are copies of the same recording; a long gap (or the first
/// program on the tape) starts a new track.
#[derive(Debug, Clone)]
pub struct Program {
    pub track_number: u32,
    pub copy_number: u32,
    /// Frame where the winning decoder locked onto the encoding.
    pub start_frame: usize,
    /// Frame where the decoder reached its terminal state.
    pub end_frame: usize,
    /// Human name of the decoder variant that won the race.
    pub decoder_name: &'static str,
    /// Terminal state: `Finished` for a clean end, `Error` for a mid-program
    /// framing failure (the partial decode is still preserved).
    pub outcome: DecoderState,
    /// The recovered byte stream.
    pub binary: Vec<u8>,
    /// Per-bit audit trail, in decode order.
    pub bits: Vec<BitRecord>,
    /// Per-byte audit trail, in decode order.
    pub bytes: Vec<ByteRecord>,
}

impl Program {
    /// Short identity label, e.g. `"Track 2, copy 1"`.
    pub fn label(&self) -> String {
        format!("Track {}, copy {}", self.track_number, self.copy_number)
    }

    /// Number of bits that could not be classified.
    pub fn bad_bit_count(&self) -> usize {
        self.bits
            .iter()
            .filter(|b| b.bit_type == BitType::Bad)
            .count()
    }

    /// Finished cleanly with no unreadable bits.
    pub fn is_clean(&self) -> bool {
        self.outcome == DecoderState::Finished && self.bad_bit_count() == 0
    }

    /// Time span of the program as timestamps, for reports.
    pub fn time_span(&self, sample_rate: u32) -> String {
        format!(
            "{} - {}",
            frame_to_timestamp(self.start_frame, sample_rate),
            frame_to_timestamp(self.end_frame, sample_rate)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_program() -> Program {
        Program {
            track_number: 2,
            copy_number: 3,
            start_frame: 1000,
            end_frame: 9000,
            decoder_name: "low speed",
            outcome: DecoderState::Finished,
            binary: vec![1, 2, 3],
            bits: vec![
                BitRecord::new(0, 10, BitType::One),
                BitRecord::new(10, 20, BitType::Bad),
                BitRecord::new(20, 30, BitType::Zero),
            ],
            bytes: vec![],
        }
    }

    #[test]
    fn test_label() {
        assert_eq!(sample_program().label(), "Track 2, copy 3");
    }

    #[test]
    fn test_bad_bit_count_and_cleanliness() {
        let program = sample_program();
        assert_eq!(program.bad_bit_count(), 1);
        assert!(!program.is_clean());

        let mut clean = sample_program();
        clean.bits.retain(|b| b.bit_type != BitType::Bad);
        assert!(clean.is_clean());
    }
}

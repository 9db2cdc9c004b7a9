//! Cassette tape decoding engine for 1970s-80s home computer recordings
//!
//! Recovers program binaries from PCM samples of cassette audio. Three
//! incompatible physical encodings are supported: a 500 baud pulse-position
//! scheme, a 1500 baud cycle-length scheme, and a clock/data pulse-pair
//! variant of the low-speed scheme. A multi-decoder race scans the whole
//! recording and segments it into consecutive programs with bit-level
//! provenance. Matching encoders synthesize decodable waveforms for
//! round-trip verification and fixture generation.

pub mod error;
pub mod conditioner;
pub mod bits;
pub mod tape;
pub mod program;
pub mod decoder;
pub mod decoder_low_speed;
pub mod decoder_high_speed;
pub mod decoder_low_speed_alt;
pub mod encoder_low_speed;
pub mod encoder_high_speed;
pub mod regression;

pub use bits::{BitRecord, BitType, ByteRecord};
pub use decoder::{Decoder, DecoderState};
pub use decoder_high_speed::HighSpeedDecoder;
pub use decoder_low_speed::LowSpeedDecoder;
pub use decoder_low_speed_alt::LowSpeedAlternateDecoder;
pub use encoder_high_speed::{encode_high_speed, strip_start_bits};
pub use encoder_low_speed::{encode_low_speed, wrap_low_speed};
pub use error::{Result, TapeError};
pub use program::Program;
pub use regression::{compare_binaries, ComparisonReport, RegressionTally};
pub use tape::Tape;

/// Sample rate all timing constants are tuned at. Constants expressed in
/// frames are scaled linearly to the actual recording rate.
pub const REFERENCE_SAMPLE_RATE: u32 = 48_000;

/// Lowest sample rate the encoders will synthesize at. Below this the
/// high-speed cycles degenerate to a handful of samples.
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Sync byte terminating the low-speed header (both low-speed variants).
pub const LOW_SPEED_SYNC_BYTE: u8 = 0xA5;

/// Full high-speed header tail: three alternating 0x55 bytes then the 0x7F
/// sync byte, matched as one 32-bit shift-register comparison.
pub const HIGH_SPEED_SYNC_PATTERN: u32 = 0x5555_557F;

/// High-pass filter window at the reference rate, in frames.
pub const FILTER_WINDOW: usize = 500;

/// Width of the pulse-accentuation windows, in seconds (125 microseconds).
pub const ACCENTUATE_PULSE_WIDTH_SECS: f64 = 125e-6;

/// Scale a frame-count constant tuned at [`REFERENCE_SAMPLE_RATE`] to the
/// actual sample rate.
pub(crate) fn scale_frames(frames: usize, sample_rate: u32) -> usize {
    ((frames as f64) * (sample_rate as f64) / (REFERENCE_SAMPLE_RATE as f64)).round() as usize
}

/// Render a frame index as "m:ss.mmm" for log lines and reports.
pub fn frame_to_timestamp(frame: usize, sample_rate: u32) -> String {
    let total_ms = (frame as u64) * 1000 / (sample_rate as u64);
    let minutes = total_ms / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{}:{:02}.{:03}", minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_frames_identity_at_reference_rate() {
        assert_eq!(scale_frames(500, REFERENCE_SAMPLE_RATE), 500);
        assert_eq!(scale_frames(22, REFERENCE_SAMPLE_RATE), 22);
    }

    #[test]
    fn test_scale_frames_rounds_to_nearest() {
        // 22 * 44100 / 48000 = 20.21 -> 20
        assert_eq!(scale_frames(22, 44_100), 20);
        // 68 * 44100 / 48000 = 62.48 -> 62
        assert_eq!(scale_frames(68, 44_100), 62);
    }

    #[test]
    fn test_frame_to_timestamp() {
        assert_eq!(frame_to_timestamp(0, 48_000), "0:00.000");
        assert_eq!(frame_to_timestamp(48_000, 48_000), "0:01.000");
        assert_eq!(frame_to_timestamp(48_000 * 61 + 24_000, 48_000), "1:01.500");
    }
}

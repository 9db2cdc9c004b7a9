//! A recording plus the conditioned sample arrays decoders work from.

use crate::conditioner::{high_pass_filter, pulse_accentuate};
use crate::{scale_frames, ACCENTUATE_PULSE_WIDTH_SECS, FILTER_WINDOW};

/// One cassette recording. The derived arrays are computed once up front;
/// decoders borrow read-only slices and never copy samples.
pub struct Tape {
    /// Raw samples as captured.
    pub samples: Vec<i16>,
    /// Frames per second.
    pub sample_rate: u32,
    /// High-pass filtered samples; input for the high-speed decoder.
    pub filtered: Vec<i16>,
    /// Pulse-accentuated samples; input for both low-speed decoders.
    pub accentuated: Vec<i16>,
}

impl Tape {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        let window = scale_frames(FILTER_WINDOW, sample_rate).max(1);
        let pulse_width =
            ((ACCENTUATE_PULSE_WIDTH_SECS * f64::from(sample_rate)).round() as usize).max(1);

        let filtered = high_pass_filter(&samples, window);
        // Accentuation reintroduces a little drift, so filter its output too.
        let accentuated = high_pass_filter(&pulse_accentuate(&filtered, pulse_width), window);

        Self {
            samples,
            sample_rate,
            filtered,
            accentuated,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tape_derives_equal_length_arrays() {
        let tape = Tape::new(vec![0i16; 10_000], 44_100);
        assert_eq!(tape.filtered.len(), 10_000);
        assert_eq!(tape.accentuated.len(), 10_000);
        assert_eq!(tape.len(), 10_000);
        assert!(!tape.is_empty());
    }

    #[test]
    fn test_tape_silence_stays_silent() {
        let tape = Tape::new(vec![0i16; 5_000], 48_000);
        assert!(tape.filtered.iter().all(|&s| s == 0));
        assert!(tape.accentuated.iter().all(|&s| s == 0));
    }
}

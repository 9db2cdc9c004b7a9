//! Sample conditioning: pure transforms that prepare raw PCM for decoding.
//!
//! Cassette interfaces record with heavy DC drift and a soft, differentiated
//! pulse shape. `high_pass_filter` removes the drift; `pulse_accentuate`
//! sharpens pulse transitions into narrow peaks the low-speed decoders can
//! threshold against.

/// Subtract a trailing moving average of width `window_size` from each
/// sample. The first `window_size` samples use a growing partial average so
/// the output is defined everywhere.
pub fn high_pass_filter(samples: &[i16], window_size: usize) -> Vec<i16> {
    let window_size = window_size.max(1);
    let mut out = Vec::with_capacity(samples.len());
    let mut sum: i64 = 0;

    for (i, &sample) in samples.iter().enumerate() {
        sum += i64::from(sample);
        let width = if i < window_size {
            i + 1
        } else {
            sum -= i64::from(samples[i - window_size]);
            window_size
        };
        let average = sum / width as i64;
        out.push(clamp_to_i16(i64::from(sample) - average));
    }

    out
}

/// Difference between the trailing and leading windowed sums (each of width
/// `pulse_width`), normalized by `2 * pulse_width`. Peaks of the output line
/// up with pulse transitions in the input. Clamped to the i16 range.
pub fn pulse_accentuate(samples: &[i16], pulse_width: usize) -> Vec<i16> {
    let pulse_width = pulse_width.max(1);
    let len = samples.len();
    let mut out = Vec::with_capacity(len);

    let at = |i: isize| -> i64 {
        if i < 0 || i as usize >= len {
            0
        } else {
            i64::from(samples[i as usize])
        }
    };

    // Trailing window covers (i - pulse_width, i], leading covers
    // (i, i + pulse_width]. Both maintained incrementally.
    let mut trailing: i64 = 0;
    let mut leading: i64 = 0;
    for j in 1..=pulse_width as isize {
        leading += at(j - 1);
    }

    for i in 0..len as isize {
        trailing += at(i) - at(i - pulse_width as isize);
        leading += at(i + pulse_width as isize) - at(i);
        let value = (trailing - leading) / (2 * pulse_width as i64);
        out.push(clamp_to_i16(value));
    }

    out
}

fn clamp_to_i16(value: i64) -> i16 {
    value.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_pass_filter_dc_converges_to_zero() {
        // Scenario: a constant nonzero level must vanish once the window
        // is fully primed.
        let samples = vec![1000i16; 2000];
        let filtered = high_pass_filter(&samples, 500);
        assert_eq!(filtered.len(), samples.len());
        for &v in &filtered[500..] {
            assert_eq!(v, 0, "DC level survived the filter");
        }
        // Warmup region uses the growing average, so it is already zero for
        // a pure DC input too.
        assert_eq!(filtered[0], 0);
    }

    #[test]
    fn test_high_pass_filter_preserves_length_and_silence() {
        let samples = vec![0i16; 777];
        let filtered = high_pass_filter(&samples, 500);
        assert_eq!(filtered, samples);
    }

    #[test]
    fn test_high_pass_filter_keeps_fast_transitions() {
        // A step retains most of its edge right after the transition.
        let mut samples = vec![0i16; 1000];
        for s in samples.iter_mut().skip(500) {
            *s = 8000;
        }
        let filtered = high_pass_filter(&samples, 500);
        assert!(filtered[500] > 7000, "edge was smeared: {}", filtered[500]);
    }

    #[test]
    fn test_pulse_accentuate_peak_aligns_with_transition() {
        // A positive-then-negative doublet (one sine cycle) should produce
        // a strong positive peak near the zero crossing in the middle.
        let mut samples = vec![0i16; 400];
        for i in 0..22 {
            let phase = 2.0 * std::f64::consts::PI * (i as f64) / 22.0;
            samples[200 + i] = (phase.sin() * 16384.0) as i16;
        }
        let out = pulse_accentuate(&samples, 6);
        assert_eq!(out.len(), samples.len());

        let (peak_frame, peak) = out
            .iter()
            .enumerate()
            .max_by_key(|(_, &v)| v)
            .map(|(i, &v)| (i, v))
            .unwrap();
        assert!(peak > 3000, "peak too weak: {}", peak);
        assert!(
            (peak_frame as i64 - 211).unsigned_abs() <= 6,
            "peak at {} not near the transition",
            peak_frame
        );
    }

    #[test]
    fn test_pulse_accentuate_clamps_extremes() {
        let mut samples = vec![i16::MAX; 100];
        for s in samples.iter_mut().skip(50) {
            *s = i16::MIN;
        }
        let out = pulse_accentuate(&samples, 10);
        for &v in &out {
            assert!((i16::MIN..=i16::MAX).contains(&v));
        }
        // Right at the step the full-window difference saturates positive.
        assert_eq!(out[49], i16::MAX);
    }
}

//! Reference-binary comparison for regression runs.
//!
//! A regression run decodes a recording and compares every recovered
//! program against a stored reference binary. The contract: report the
//! first differing byte index with both values (a length difference counts
//! as a mismatch at the shorter length), plus a final pass/fail tally. A
//! bad bit never aborts a run; it only shows up in the report.

use log::{info, warn};

use crate::program::Program;

/// First point where two binaries disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Byte index of the first difference.
    pub index: usize,
    /// Value found in the decoded binary, if it extends that far.
    pub actual: Option<u8>,
    /// Value found in the reference, if it extends that far.
    pub expected: Option<u8>,
}

/// Outcome of comparing one decoded binary against the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonReport {
    pub actual_len: usize,
    pub expected_len: usize,
    pub first_mismatch: Option<Mismatch>,
}

impl ComparisonReport {
    pub fn matches(&self) -> bool {
        self.first_mismatch.is_none()
    }
}

/// Compare a decoded binary against the reference, byte by byte.
pub fn compare_binaries(actual: &[u8], expected: &[u8]) -> ComparisonReport {
    let common = actual.len().min(expected.len());
    let first_mismatch = actual[..common]
        .iter()
        .zip(&expected[..common])
        .position(|(a, e)| a != e)
        .map(|index| Mismatch {
            index,
            actual: Some(actual[index]),
            expected: Some(expected[index]),
        })
        .or_else(|| {
            if actual.len() != expected.len() {
                Some(Mismatch {
                    index: common,
                    actual: actual.get(common).copied(),
                    expected: expected.get(common).copied(),
                })
            } else {
                None
            }
        });

    ComparisonReport {
        actual_len: actual.len(),
        expected_len: expected.len(),
        first_mismatch,
    }
}

/// Pass/fail tally across a whole regression run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegressionTally {
    pub passed: usize,
    pub failed: usize,
}

impl RegressionTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare one program against the reference, log the verdict, and fold
    /// it into the tally.
    pub fn record(&mut self, program: &Program, expected: &[u8]) -> ComparisonReport {
        let report = compare_binaries(&program.binary, expected);
        let bad_bits = program.bad_bit_count();
        if report.matches() {
            self.passed += 1;
            info!("{}: match ({} bad bits)", program.label(), bad_bits);
        } else {
            self.failed += 1;
            if let Some(mismatch) = report.first_mismatch {
                warn!(
                    "{}: mismatch at byte {} (decoded {:?}, reference {:?}), {} bad bits",
                    program.label(),
                    mismatch.index,
                    mismatch.actual,
                    mismatch.expected,
                    bad_bits
                );
            }
        }
        report
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }
}

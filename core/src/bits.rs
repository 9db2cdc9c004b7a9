//! Shared decode vocabulary: per-bit and per-byte provenance records.

/// Classification of one decoded bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitType {
    /// A zero data bit.
    Zero,
    /// A one data bit.
    One,
    /// The implicit start bit preceding each high-speed byte.
    Start,
    /// Timing did not match any expected shape; value untrusted.
    Bad,
}

impl BitType {
    /// Whether this record carries a data bit that counts toward byte framing.
    pub fn is_data(self) -> bool {
        matches!(self, BitType::Zero | BitType::One)
    }
}

/// One decoded bit's time extent and classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRecord {
    pub start_frame: usize,
    pub end_frame: usize,
    pub bit_type: BitType,
}

impl BitRecord {
    pub fn new(start_frame: usize, end_frame: usize, bit_type: BitType) -> Self {
        Self {
            start_frame,
            end_frame,
            bit_type,
        }
    }
}

/// One successfully framed byte and the sample range it was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRecord {
    pub value: u8,
    pub start_frame: usize,
    pub end_frame: usize,
}

impl ByteRecord {
    pub fn new(value: u8, start_frame: usize, end_frame: usize) -> Self {
        Self {
            value,
            start_frame,
            end_frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_type_is_data() {
        assert!(BitType::Zero.is_data());
        assert!(BitType::One.is_data());
        assert!(!BitType::Start.is_data());
        assert!(!BitType::Bad.is_data());
    }
}

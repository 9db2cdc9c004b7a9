use thiserror::Error;

/// Failures surfaced to callers. Decode anomalies are deliberately not here:
/// a bad bit becomes a `BitType::Bad` record and a desynchronized decoder
/// moves to `DecoderState::Error`, so partial recoveries stay available.
#[derive(Debug, Error)]
pub enum TapeError {
    #[error("cannot encode an empty byte sequence")]
    EmptyPayload,

    #[error("sample rate {0} Hz is too low to synthesize tape audio")]
    InvalidSampleRate(u32),
}

pub type Result<T> = std::result::Result<T, TapeError>;

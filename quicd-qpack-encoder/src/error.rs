//! Error types for the QPACK encoder.
//!
//! Fatal errors map to the HTTP/3 error codes of RFC 9204 Section 6 and
//! close the connection: the dynamic table is a single, totally ordered
//! structure shared with the peer, so once either side of it is in doubt
//! nothing can be salvaged locally. Recoverable errors never leave the
//! encoder; they make it fall back to a literal representation.

use thiserror::Error;

/// Result type for QPACK encoder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP/3 error code `QPACK_DECOMPRESSION_FAILED`.
pub const QPACK_DECOMPRESSION_FAILED: u64 = 0x0200;
/// HTTP/3 error code `QPACK_ENCODER_STREAM_ERROR`.
pub const QPACK_ENCODER_STREAM_ERROR: u64 = 0x0201;
/// HTTP/3 error code `QPACK_DECODER_STREAM_ERROR`.
pub const QPACK_DECODER_STREAM_ERROR: u64 = 0x0202;

/// Invalid feedback received from the peer's decoder on the decoder stream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderFeedbackError {
    /// Insert Count Increment would acknowledge entries never inserted.
    #[error("insert count increment to {requested} exceeds inserted count {inserted}")]
    ImpossibleInsertCount { requested: u64, inserted: u64 },

    /// Section Acknowledgement for a stream with no outstanding field section.
    #[error("section acknowledgement for stream {0} with no outstanding field section")]
    IncorrectAcknowledgement(u64),

    /// Insert Count Increment with a zero increment.
    #[error("insert count increment of zero")]
    InvalidZeroIncrement,

    /// Known Received Count overflowed.
    #[error("known received count overflow")]
    Overflow,
}

/// Errors that can occur during QPACK encoder operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed wire data: a bad prefixed integer, a bad Huffman string or
    /// a truncated instruction that can never complete.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Dynamic table capacity above the maximum negotiated with the peer.
    #[error("dynamic table capacity {requested} exceeds negotiated maximum {maximum}")]
    CapacityExceedsLimit { requested: usize, maximum: usize },

    /// The peer's decoder sent invalid feedback.
    #[error("decoder stream error: {0}")]
    DecoderFeedback(#[from] DecoderFeedbackError),

    /// A fatal error was already reported on this connection.
    #[error("connection closed after fatal QPACK error")]
    ConnectionClosed,

    /// An entry does not fit even after evicting every evictable entry.
    ///
    /// Recoverable: the encoder emits a literal instead.
    #[error("no room for entry of size {needed}: at most {available} bytes can be freed")]
    InsufficientSpace { needed: usize, available: usize },

    /// Referencing unacknowledged state would exceed the blocked stream limit.
    ///
    /// Recoverable: the encoder emits a literal instead.
    #[error("stream {0} may not block: blocked stream limit reached")]
    BlockingBudgetExceeded(u64),

    /// Incomplete data: more bytes are needed to finish an instruction.
    #[error("incomplete data")]
    Incomplete,

    /// Rejected encoder configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns the HTTP/3 error code used to close the connection.
    pub fn error_code(&self) -> u64 {
        match self {
            Error::DecoderFeedback(_) => QPACK_DECODER_STREAM_ERROR,
            Error::CapacityExceedsLimit { .. } => QPACK_ENCODER_STREAM_ERROR,
            _ => QPACK_DECOMPRESSION_FAILED,
        }
    }

    /// Returns true if the error must terminate the connection.
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns true if the encoder handles this error by falling back to a
    /// literal, or by waiting for more input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientSpace { .. } | Error::BlockingBudgetExceeded(_) | Error::Incomplete
        )
    }
}

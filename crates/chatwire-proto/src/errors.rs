//! Codec error types.
//!
//! Decoding distinguishes two non-fatal outcomes: a frame whose `type` we do
//! not recognize (forward-compatibility, diagnostic only) and a frame that
//! fails structural parsing. Neither affects other frames in the same
//! delivery or the connection itself.

use thiserror::Error;

use crate::codec::MAX_FRAME_BYTES;

/// Failure to decode a single wire segment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The segment parsed as a record but its `type` discriminant is not one
    /// we know. Yields no event; callers should surface it as a warning, not
    /// a failure.
    #[error("unrecognized frame type in segment: {raw}")]
    UnknownKind {
        /// The raw segment text, for diagnostics.
        raw: String,
    },

    /// The segment is not a structurally valid frame.
    #[error("malformed frame ({reason}): {raw}")]
    Malformed {
        /// The raw segment text, for diagnostics.
        raw: String,
        /// What the parser objected to.
        reason: String,
    },
}

/// Failure to encode an outbound action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// Content was empty after trimming surrounding whitespace.
    ///
    /// Callers are expected to have rejected empty input already; the codec
    /// re-validates.
    #[error("message content is empty after trimming")]
    EmptyContent,

    /// The encoded frame exceeds the server's per-frame read limit.
    #[error("encoded frame is {size} bytes, limit is {MAX_FRAME_BYTES}")]
    FrameTooLarge {
        /// Size of the rejected frame in bytes.
        size: usize,
    },

    /// JSON serialization failed.
    #[error("failed to serialize frame: {0}")]
    Serialize(String),
}

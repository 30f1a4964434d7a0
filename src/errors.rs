//! A module to handle all errors of the wire codec

use thiserror::Error;

/// An error while encoding or decoding protobuf data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The output sink is full, or the input ended before a complete value
    #[error("Out of space in the sink or unexpected end of input")]
    OutOfSpace,
    /// `write_at` was called outside the already written prefix of the stream
    #[error("Write position is outside the written range")]
    InvalidPosition,
    /// Malformed varint, deprecated group framing or a length prefix that
    /// overruns the remaining input
    #[error("Malformed or schema-mismatched input")]
    InvalidInput,
    /// A backing allocation failed or the payload outgrew its size estimate
    #[error("Allocation or other backend failure")]
    General,
}

/// A wrapper for the result of any fallible codec operation
pub type Result<T> = ::std::result::Result<T, Error>;

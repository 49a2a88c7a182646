//! Error types for the decoding pipeline.

use thiserror::Error;

/// An error encountered while decoding some part of the Photon wire format.
///
/// Every variant except [`DecodeError::Io`] is local to the message or
/// parameter being decoded: callers drop the offending message and keep
/// processing the capture stream.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Fewer bytes remained in the buffer than the value being decoded needs.
    #[error("truncated input")]
    TruncatedInput,

    /// A type-tag byte didn't match any known `TypedValue` tag.
    #[error("unknown type tag: 0x{0:02x}")]
    UnknownTypeTag(u8),

    /// A boolean byte was neither 0 nor 1.
    #[error("invalid boolean byte: {0}")]
    BadBoolean(u8),

    /// A command's declared length ran past the end of the datagram.
    #[error("malformed datagram: command length exceeds remaining bytes")]
    MalformedDatagram,

    /// The reliable message's type byte had the high bit set (`type > 128`).
    #[error("encrypted message, decoding not supported")]
    EncryptionNotSupported,

    /// A reliable message header carried a `type` byte with no known meaning.
    #[error("unknown reliable message type: {0}")]
    UnknownMessageType(u8),

    /// Neither parameter 252 nor 253 was present where a discriminator was required.
    #[error("missing operation/event discriminator (params 252/253)")]
    MissingDiscriminator,

    /// A field's declared coercion didn't match the decoded value's shape.
    #[error("type mismatch for field {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Name of the field being bound.
        field: &'static str,
        /// The coercion that was declared for the field.
        expected: &'static str,
        /// A short description of what was actually decoded.
        actual: String,
    },

    /// A character ID byte slice had a length other than 16.
    #[error("character id has invalid length: {0} (expected 16)")]
    CharacterIdBadLength(usize),

    /// Short read from the underlying byte source.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

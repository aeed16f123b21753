//! Codec-level errors with diagnostic context.

use thiserror::Error;

/// Errors produced while framing, validating, or translating MAVLink bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer does not begin with a valid magic byte, or is too short to
    /// carry a frame at all.
    #[error("not a frame: {reason}")]
    NotAFrame { reason: &'static str },

    /// The header's declared payload length disagrees with the bytes present.
    #[error("frame length mismatch: header declares {declared} payload bytes, buffer carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Checksum validation failed; the frame is dropped.
    #[error("crc mismatch on message {message_id}: frame carries {expected:#06x}, computed {computed:#06x}")]
    FailedCrc {
        message_id: u32,
        expected: u16,
        computed: u16,
    },

    /// The message id is not part of the dialect.
    #[error("message id {0} is not defined in the dialect")]
    UnknownMessage(u32),

    /// A pack was requested for a message the dialect cannot encode.
    #[error("message id {0} cannot be packed: not defined in the dialect")]
    ProtocolUndefined(u32),

    /// Message ids above 255 do not fit the v1 envelope.
    #[error("message id {0} exceeds the v1 id space")]
    V1IdOverflow(u32),
}

//! Error types for the codec, framing and packet layers.

use crate::packets::ConnectionState;

/// A field-level failure while reading a payload.
///
/// These are local to one frame: the frame is dropped and the connection
/// keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("read past end of packet (needed {needed} bytes, {remaining} left)")]
    OutOfData { needed: usize, remaining: usize },

    #[error("varint is longer than 5 bytes")]
    VarIntTooLarge,

    #[error("varlong is longer than 10 bytes")]
    VarLongTooLarge,

    #[error("negative length prefix {0}")]
    NegativeLength(i32),

    #[error("string byte length {len} exceeds maximum {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("string has {count} characters, limit is {max}")]
    CharLimitExceeded { count: usize, max: usize },

    #[error("string is not valid UTF-8")]
    InvalidUtf8,
}

/// A failure while building an outbound packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("string has {count} characters, limit is {max}")]
    CharLimitExceeded { count: usize, max: usize },

    #[error("legacy string of {0} bytes does not fit a 16-bit length")]
    LegacyStringTooLong(usize),

    #[error("byte array of {0} bytes does not fit a varint length")]
    ArrayTooLong(usize),

    #[error("frame of {size} bytes exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("failed to serialize JSON payload: {0}")]
    Json(String),
}

/// A failure in the stream framing layer. Always fatal for the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame length prefix is longer than 5 bytes")]
    VarIntTooLarge,

    #[error("negative frame length {0}")]
    NegativeLength(i32),

    #[error("frame length {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },
}

/// A failure to turn one frame into a typed packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The identifier has no meaning in the current connection state.
    #[error("unknown packet id 0x{id:02X} in state {state:?}")]
    UnknownPacket { state: ConnectionState, id: i32 },
}

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

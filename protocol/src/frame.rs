//! Length-prefixed stream framing.
//!
//! ```text
//! +----------------------+------------------------------+
//! | length (varint, 1-5) |  payload (length bytes)      |
//! +----------------------+------------------------------+
//! ```
//!
//! A TCP read can deliver half a frame, several frames, or a frame split across
//! many reads. [`FrameAssembler`] accumulates whatever arrives and hands out
//! payloads only once they are complete. A bad length prefix is reported as a
//! [`FrameError`], after which the stream cannot be resynchronised.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{put_varint, MAX_VARINT_LEN};
use crate::error::FrameError;
use crate::MAX_FRAME_LEN;

/// Outcome of scanning for a length prefix at the head of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    /// The prefix is not terminated yet.
    Incomplete,
    /// A complete prefix: the declared length and how many bytes it took.
    Complete { length: i32, prefix_len: usize },
}

/// Decodes a varint at the start of `buf` without consuming it.
///
/// At most five bytes are looked at; five continuation bytes in a row is a
/// malformed prefix.
pub fn peek_length_prefix(buf: &[u8]) -> Result<LengthPrefix, FrameError> {
    let mut value: u32 = 0;
    for (i, byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(LengthPrefix::Complete {
                length: value as i32,
                prefix_len: i + 1,
            });
        }
    }
    if buf.len() >= MAX_VARINT_LEN {
        return Err(FrameError::VarIntTooLarge);
    }
    Ok(LengthPrefix::Incomplete)
}

/// Prefixes `payload` with its length, producing one wire frame.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(MAX_VARINT_LEN + payload.len());
    put_varint(dst, payload.len() as i32);
    dst.put_slice(payload);
}

/// Per-connection accumulation buffer that yields complete frame payloads.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    max_frame_len: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(MAX_FRAME_LEN)
    }
}

impl FrameAssembler {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            max_frame_len,
        }
    }

    /// Appends freshly received bytes.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes currently buffered and not yet handed out.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Takes the next complete frame payload off the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Never blocks.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        let (length, prefix_len) = match peek_length_prefix(&self.buf)? {
            LengthPrefix::Incomplete => return Ok(None),
            LengthPrefix::Complete { length, prefix_len } => (length, prefix_len),
        };

        if length < 0 {
            return Err(FrameError::NegativeLength(length));
        }
        let length = length as usize;
        if length > self.max_frame_len {
            return Err(FrameError::FrameTooLarge {
                size: length,
                max: self.max_frame_len,
            });
        }

        if self.buf.len() < prefix_len + length {
            return Ok(None);
        }

        self.buf.advance(prefix_len);
        Ok(Some(self.buf.split_to(length).freeze()))
    }

    /// Appends `chunk` and drains every frame that is now complete, in order.
    ///
    /// On a framing error the frames decoded before it are discarded along with
    /// the rest of the stream.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>, FrameError> {
        self.extend(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

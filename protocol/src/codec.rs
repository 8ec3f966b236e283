//! Bounds-checked binary codec for packet payloads.
//!
//! Inbound payloads are read through a [`PacketReader`], which owns the frame
//! bytes and advances a cursor over them; every primitive checks the remaining
//! length first and fails with [`DecodeError::OutOfData`] instead of reading
//! past the end.
//!
//! Outbound payloads are built with a [`PacketWriter`], which starts with the
//! packet identifier and is consumed by [`PacketWriter::finalize`]. Since
//! `finalize` takes the writer by value, a frame can never be length-prefixed
//! twice.
//!
//! All fixed-width fields are big-endian. Variable-length integers use 7 bits
//! per byte, least significant group first, with the high bit as continuation.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::MAX_OUTBOUND_FRAME_LEN;

/// Longest valid varint encoding.
pub const MAX_VARINT_LEN: usize = 5;

/// Longest valid varlong encoding.
pub const MAX_VARLONG_LEN: usize = 10;

const SEGMENT_BITS: u8 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

/// Number of bytes the minimal varint encoding of `value` occupies.
pub fn varint_len(value: i32) -> usize {
    let mut v = value as u32;
    let mut len = 1;
    while v >= u32::from(CONTINUE_BIT) {
        v >>= 7;
        len += 1;
    }
    len
}

/// Appends the minimal varint encoding of `value`.
///
/// Negative numbers are written as their two's complement bit pattern and
/// therefore always take five bytes.
pub fn put_varint(dst: &mut BytesMut, value: i32) {
    let mut v = value as u32;
    loop {
        if v & !u32::from(SEGMENT_BITS) == 0 {
            dst.put_u8(v as u8);
            return;
        }
        dst.put_u8((v as u8 & SEGMENT_BITS) | CONTINUE_BIT);
        v >>= 7;
    }
}

/// Appends the minimal varlong encoding of `value`.
pub fn put_varlong(dst: &mut BytesMut, value: i64) {
    let mut v = value as u64;
    loop {
        if v & !u64::from(SEGMENT_BITS) == 0 {
            dst.put_u8(v as u8);
            return;
        }
        dst.put_u8((v as u8 & SEGMENT_BITS) | CONTINUE_BIT);
        v >>= 7;
    }
}

/// Number of characters in a UTF-8 byte string, counted by lead bytes.
fn char_count(bytes: &[u8]) -> usize {
    bytes.iter().filter(|b| (**b & 0xC0) != 0x80).count()
}

/// Cursor over the payload of one inbound frame.
#[derive(Debug, Clone)]
pub struct PacketReader {
    buf: Bytes,
    len: usize,
}

impl PacketReader {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        let buf = payload.into();
        let len = buf.len();
        Self { buf, len }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Offset of the cursor from the start of the payload.
    pub fn position(&self) -> usize {
        self.len - self.buf.remaining()
    }

    pub fn is_exhausted(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn ensure(&self, needed: usize) -> DecodeResult<()> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(DecodeError::OutOfData { needed, remaining });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    /// Reads a boolean byte; any non-zero value is `true`.
    pub fn read_bool(&mut self) -> DecodeResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_i32(&mut self) -> DecodeResult<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_i64(&mut self) -> DecodeResult<i64> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        self.ensure(4)?;
        Ok(f32::from_bits(self.buf.get_u32()))
    }

    pub fn read_f64(&mut self) -> DecodeResult<f64> {
        self.ensure(8)?;
        Ok(f64::from_bits(self.buf.get_u64()))
    }

    /// Reads a varint. Non-minimal encodings are accepted as long as they fit
    /// in five bytes.
    pub fn read_varint(&mut self) -> DecodeResult<i32> {
        let mut result: u32 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            result |= u32::from(byte & SEGMENT_BITS) << (7 * i);
            if byte & CONTINUE_BIT == 0 {
                return Ok(result as i32);
            }
        }
        Err(DecodeError::VarIntTooLarge)
    }

    pub fn read_varlong(&mut self) -> DecodeResult<i64> {
        let mut result: u64 = 0;
        for i in 0..MAX_VARLONG_LEN {
            let byte = self.read_u8()?;
            result |= u64::from(byte & SEGMENT_BITS) << (7 * i);
            if byte & CONTINUE_BIT == 0 {
                return Ok(result as i64);
            }
        }
        Err(DecodeError::VarLongTooLarge)
    }

    fn read_length(&mut self) -> DecodeResult<usize> {
        let len = self.read_varint()?;
        if len < 0 {
            return Err(DecodeError::NegativeLength(len));
        }
        Ok(len as usize)
    }

    /// Reads a varint-length-prefixed UTF-8 string of at most `max_chars`
    /// characters.
    ///
    /// The declared byte length is checked against `4 * max_chars` before any
    /// bytes are taken, and the character count is checked again after
    /// decoding.
    pub fn read_string(&mut self, max_chars: usize) -> DecodeResult<String> {
        let len = self.read_length()?;
        let max_bytes = max_chars.saturating_mul(4);
        if len > max_bytes {
            return Err(DecodeError::StringTooLong {
                len,
                max: max_bytes,
            });
        }
        self.ensure(len)?;

        let raw = self.buf.split_to(len);
        let count = char_count(&raw);
        if count > max_chars {
            return Err(DecodeError::CharLimitExceeded {
                count,
                max: max_chars,
            });
        }
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Reads a string prefixed by a big-endian 16-bit byte length. No
    /// character limit applies.
    pub fn read_legacy_string(&mut self) -> DecodeResult<String> {
        let len = usize::from(self.read_u16()?);
        self.ensure(len)?;
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Reads a varint-length-prefixed byte array.
    pub fn read_byte_array(&mut self) -> DecodeResult<Bytes> {
        let len = self.read_length()?;
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }
}

/// Append-only builder for one outbound packet.
#[derive(Debug)]
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    /// Starts a payload whose first field is `packet_id`.
    pub fn new(packet_id: i32) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        put_varint(&mut buf, packet_id);
        Self { buf }
    }

    /// Current payload length, identifier included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_u32(value.to_bits());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_u64(value.to_bits());
    }

    pub fn write_varint(&mut self, value: i32) {
        put_varint(&mut self.buf, value);
    }

    pub fn write_varlong(&mut self, value: i64) {
        put_varlong(&mut self.buf, value);
    }

    /// Writes a varint-length-prefixed string, refusing anything longer than
    /// `max_chars` characters.
    pub fn write_string(&mut self, value: &str, max_chars: usize) -> EncodeResult<()> {
        let count = char_count(value.as_bytes());
        if count > max_chars {
            return Err(EncodeError::CharLimitExceeded {
                count,
                max: max_chars,
            });
        }
        let len = i32::try_from(value.len()).map_err(|_| EncodeError::CharLimitExceeded {
            count,
            max: max_chars,
        })?;
        self.write_varint(len);
        self.buf.put_slice(value.as_bytes());
        Ok(())
    }

    /// Writes a string prefixed by a big-endian 16-bit byte length.
    pub fn write_legacy_string(&mut self, value: &str) -> EncodeResult<()> {
        let len =
            u16::try_from(value.len()).map_err(|_| EncodeError::LegacyStringTooLong(value.len()))?;
        self.buf.put_u16(len);
        self.buf.put_slice(value.as_bytes());
        Ok(())
    }

    pub fn write_byte_array(&mut self, value: &[u8]) -> EncodeResult<()> {
        let len = i32::try_from(value.len()).map_err(|_| EncodeError::ArrayTooLong(value.len()))?;
        self.write_varint(len);
        self.buf.put_slice(value);
        Ok(())
    }

    /// Prepends the payload length and returns the wire-ready frame.
    ///
    /// This is the terminal step for every outbound packet and consumes the
    /// writer.
    pub fn finalize(self) -> EncodeResult<Bytes> {
        let len = self.buf.len();
        if len > MAX_OUTBOUND_FRAME_LEN {
            return Err(EncodeError::FrameTooLarge {
                size: len,
                max: MAX_OUTBOUND_FRAME_LEN,
            });
        }
        let mut frame = BytesMut::with_capacity(MAX_VARINT_LEN + len);
        put_varint(&mut frame, len as i32);
        frame.put_slice(&self.buf);
        Ok(frame.freeze())
    }
}

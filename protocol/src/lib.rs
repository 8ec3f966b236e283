//! # Protocol
//!
//! Wire-level building blocks shared by the server and by tools that talk to
//! it: the binary codec, stream framing, and the packet catalog for protocol
//! revision 340 (game version 1.12.2).
//!
//! ## Layers
//!
//! - [`codec`]: bounds-checked [`PacketReader`] and append-only
//!   [`PacketWriter`] with varint/varlong, fixed-width big-endian numbers and
//!   length-prefixed strings.
//! - [`frame`]: [`FrameAssembler`] turns an arbitrarily chunked byte stream
//!   into whole frame payloads and rejects bad length prefixes.
//! - [`packets`]: [`ServerboundPacket`] and [`ClientboundPacket`], decoded by
//!   `(ConnectionState, packet id)`.
//! - [`text`]: JSON documents carried in string fields (chat components and
//!   the server-list status).
//!
//! None of these types touch sockets; the server crate owns all I/O.

pub mod codec;
pub mod error;
pub mod frame;
pub mod packets;
pub mod text;

pub use codec::{PacketReader, PacketWriter};
pub use error::{DecodeError, EncodeError, FrameError, PacketError};
pub use frame::FrameAssembler;
pub use packets::{ClientboundPacket, ConnectionState, ServerboundPacket};
pub use text::{ServerStatus, TextComponent};

/// Protocol number announced in the status response.
pub const PROTOCOL_VERSION: i32 = 340;

/// Game version name announced in the status response.
pub const VERSION_NAME: &str = "1.12.2";

/// Largest inbound frame payload accepted from a client.
pub const MAX_FRAME_LEN: usize = 32767;

/// Largest outbound frame payload (the biggest three-byte varint).
pub const MAX_OUTBOUND_FRAME_LEN: usize = 2_097_151;

/// Absolute position in the world.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Head rotation in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rotation {
    pub yaw: f32,
    pub pitch: f32,
}

impl Rotation {
    pub fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch }
    }
}

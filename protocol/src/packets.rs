//! Packet catalog for protocol 340.
//!
//! A packet identifier only means something together with the connection
//! state: `0x00` is a Handshake, a Status-Request, a Login-Start or a
//! Teleport-Confirm depending on where the session is. Decoding therefore
//! always takes the state, and the catalog is a closed set of variants matched
//! on `(state, id)`.

use bytes::Bytes;

use crate::codec::{PacketReader, PacketWriter};
use crate::error::{EncodeResult, PacketError};
use crate::{Position, Rotation};

/// Packet identifiers, grouped by direction.
pub mod ids {
    pub mod serverbound {
        pub const HANDSHAKE: i32 = 0x00;

        pub const STATUS_REQUEST: i32 = 0x00;
        pub const PING: i32 = 0x01;

        pub const LOGIN_START: i32 = 0x00;

        pub const TELEPORT_CONFIRM: i32 = 0x00;
        pub const CHAT_MESSAGE: i32 = 0x02;
        pub const KEEP_ALIVE: i32 = 0x0B;
        pub const PLAYER: i32 = 0x0C;
        pub const PLAYER_POSITION: i32 = 0x0D;
        pub const PLAYER_POSITION_LOOK: i32 = 0x0E;
        pub const PLAYER_LOOK: i32 = 0x0F;
    }

    pub mod clientbound {
        pub const STATUS_RESPONSE: i32 = 0x00;
        pub const PONG: i32 = 0x01;

        pub const LOGIN_DISCONNECT: i32 = 0x00;
        pub const LOGIN_SUCCESS: i32 = 0x02;

        pub const CHAT_MESSAGE: i32 = 0x0F;
        pub const KEEP_ALIVE: i32 = 0x1F;
        pub const CHUNK_DATA: i32 = 0x20;
        pub const JOIN_GAME: i32 = 0x23;
        pub const PLAYER_POSITION_LOOK: i32 = 0x2F;
    }
}

use ids::{clientbound as cb, serverbound as sb};

/// Maximum characters in the handshake's server address.
pub const MAX_SERVER_ADDRESS_CHARS: usize = 255;
/// Maximum characters in a player name.
pub const MAX_USERNAME_CHARS: usize = 16;
/// Maximum characters in a chat line typed by a client.
pub const MAX_CHAT_CHARS: usize = 256;
/// Maximum characters in a hyphenated UUID.
pub const MAX_UUID_CHARS: usize = 36;
/// Maximum characters in a level type name.
pub const MAX_LEVEL_TYPE_CHARS: usize = 16;
/// Maximum characters in any JSON document sent to the client.
pub const MAX_JSON_CHARS: usize = 32767;

/// Protocol phase of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Handshake = 0,
    Status = 1,
    Login = 2,
    Play = 3,
    /// Terminal state; nothing more is read from the connection.
    Disconnected = 4,
}

impl ConnectionState {
    /// Maps the handshake's `next_state` field to a state.
    pub fn from_next_state(next_state: i32) -> Option<Self> {
        match next_state {
            1 => Some(ConnectionState::Status),
            2 => Some(ConnectionState::Login),
            _ => None,
        }
    }
}

/// Packets sent by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerboundPacket {
    Handshake {
        protocol_version: i32,
        server_address: String,
        server_port: u16,
        next_state: i32,
    },
    StatusRequest,
    Ping {
        payload: i64,
    },
    LoginStart {
        username: String,
    },
    TeleportConfirm {
        teleport_id: i32,
    },
    ChatMessage {
        message: String,
    },
    KeepAlive {
        id: i64,
    },
    Player {
        on_ground: bool,
    },
    PlayerPosition {
        position: Position,
        on_ground: bool,
    },
    PlayerPositionLook {
        position: Position,
        rotation: Rotation,
        on_ground: bool,
    },
    PlayerLook {
        rotation: Rotation,
        on_ground: bool,
    },
}

fn read_position(reader: &mut PacketReader) -> Result<Position, PacketError> {
    Ok(Position {
        x: reader.read_f64()?,
        y: reader.read_f64()?,
        z: reader.read_f64()?,
    })
}

fn read_rotation(reader: &mut PacketReader) -> Result<Rotation, PacketError> {
    Ok(Rotation {
        yaw: reader.read_f32()?,
        pitch: reader.read_f32()?,
    })
}

fn write_position(writer: &mut PacketWriter, position: &Position) {
    writer.write_f64(position.x);
    writer.write_f64(position.y);
    writer.write_f64(position.z);
}

fn write_rotation(writer: &mut PacketWriter, rotation: &Rotation) {
    writer.write_f32(rotation.yaw);
    writer.write_f32(rotation.pitch);
}

impl ServerboundPacket {
    /// Decodes one frame payload received while in `state`.
    ///
    /// Bytes left over after the declared fields are ignored.
    pub fn decode(state: ConnectionState, payload: Bytes) -> Result<Self, PacketError> {
        let mut r = PacketReader::new(payload);
        let id = r.read_varint()?;

        let packet = match (state, id) {
            (ConnectionState::Handshake, sb::HANDSHAKE) => ServerboundPacket::Handshake {
                protocol_version: r.read_varint()?,
                server_address: r.read_string(MAX_SERVER_ADDRESS_CHARS)?,
                server_port: r.read_u16()?,
                next_state: r.read_varint()?,
            },
            (ConnectionState::Status, sb::STATUS_REQUEST) => ServerboundPacket::StatusRequest,
            (ConnectionState::Status, sb::PING) => ServerboundPacket::Ping {
                payload: r.read_i64()?,
            },
            (ConnectionState::Login, sb::LOGIN_START) => ServerboundPacket::LoginStart {
                username: r.read_string(MAX_USERNAME_CHARS)?,
            },
            (ConnectionState::Play, sb::TELEPORT_CONFIRM) => ServerboundPacket::TeleportConfirm {
                teleport_id: r.read_varint()?,
            },
            (ConnectionState::Play, sb::CHAT_MESSAGE) => ServerboundPacket::ChatMessage {
                message: r.read_string(MAX_CHAT_CHARS)?,
            },
            (ConnectionState::Play, sb::KEEP_ALIVE) => ServerboundPacket::KeepAlive {
                id: r.read_i64()?,
            },
            (ConnectionState::Play, sb::PLAYER) => ServerboundPacket::Player {
                on_ground: r.read_bool()?,
            },
            (ConnectionState::Play, sb::PLAYER_POSITION) => ServerboundPacket::PlayerPosition {
                position: read_position(&mut r)?,
                on_ground: r.read_bool()?,
            },
            (ConnectionState::Play, sb::PLAYER_POSITION_LOOK) => {
                ServerboundPacket::PlayerPositionLook {
                    position: read_position(&mut r)?,
                    rotation: read_rotation(&mut r)?,
                    on_ground: r.read_bool()?,
                }
            }
            (ConnectionState::Play, sb::PLAYER_LOOK) => ServerboundPacket::PlayerLook {
                rotation: read_rotation(&mut r)?,
                on_ground: r.read_bool()?,
            },
            _ => return Err(PacketError::UnknownPacket { state, id }),
        };

        Ok(packet)
    }

    pub fn id(&self) -> i32 {
        match self {
            ServerboundPacket::Handshake { .. } => sb::HANDSHAKE,
            ServerboundPacket::StatusRequest => sb::STATUS_REQUEST,
            ServerboundPacket::Ping { .. } => sb::PING,
            ServerboundPacket::LoginStart { .. } => sb::LOGIN_START,
            ServerboundPacket::TeleportConfirm { .. } => sb::TELEPORT_CONFIRM,
            ServerboundPacket::ChatMessage { .. } => sb::CHAT_MESSAGE,
            ServerboundPacket::KeepAlive { .. } => sb::KEEP_ALIVE,
            ServerboundPacket::Player { .. } => sb::PLAYER,
            ServerboundPacket::PlayerPosition { .. } => sb::PLAYER_POSITION,
            ServerboundPacket::PlayerPositionLook { .. } => sb::PLAYER_POSITION_LOOK,
            ServerboundPacket::PlayerLook { .. } => sb::PLAYER_LOOK,
        }
    }

    /// Builds the wire frame for this packet, as a client would send it.
    pub fn encode(&self) -> EncodeResult<Bytes> {
        let mut w = PacketWriter::new(self.id());
        match self {
            ServerboundPacket::Handshake {
                protocol_version,
                server_address,
                server_port,
                next_state,
            } => {
                w.write_varint(*protocol_version);
                w.write_string(server_address, MAX_SERVER_ADDRESS_CHARS)?;
                w.write_u16(*server_port);
                w.write_varint(*next_state);
            }
            ServerboundPacket::StatusRequest => {}
            ServerboundPacket::Ping { payload } => w.write_i64(*payload),
            ServerboundPacket::LoginStart { username } => {
                w.write_string(username, MAX_USERNAME_CHARS)?;
            }
            ServerboundPacket::TeleportConfirm { teleport_id } => w.write_varint(*teleport_id),
            ServerboundPacket::ChatMessage { message } => {
                w.write_string(message, MAX_CHAT_CHARS)?;
            }
            ServerboundPacket::KeepAlive { id } => w.write_i64(*id),
            ServerboundPacket::Player { on_ground } => w.write_bool(*on_ground),
            ServerboundPacket::PlayerPosition {
                position,
                on_ground,
            } => {
                write_position(&mut w, position);
                w.write_bool(*on_ground);
            }
            ServerboundPacket::PlayerPositionLook {
                position,
                rotation,
                on_ground,
            } => {
                write_position(&mut w, position);
                write_rotation(&mut w, rotation);
                w.write_bool(*on_ground);
            }
            ServerboundPacket::PlayerLook {
                rotation,
                on_ground,
            } => {
                write_rotation(&mut w, rotation);
                w.write_bool(*on_ground);
            }
        }
        w.finalize()
    }
}

/// Packets sent by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientboundPacket {
    StatusResponse {
        json: String,
    },
    Pong {
        payload: i64,
    },
    LoginDisconnect {
        reason: String,
    },
    LoginSuccess {
        uuid: String,
        username: String,
    },
    JoinGame {
        entity_id: i32,
        gamemode: u8,
        dimension: i32,
        difficulty: u8,
        max_players: u8,
        level_type: String,
        reduced_debug_info: bool,
    },
    PlayerPositionLook {
        position: Position,
        rotation: Rotation,
        flags: u8,
        teleport_id: i32,
    },
    /// The id is written as a fixed eight-byte integer, not a varint.
    KeepAlive {
        id: i64,
    },
    ChatMessage {
        json: String,
        position: u8,
    },
    ChunkData {
        chunk_x: i32,
        chunk_z: i32,
        ground_up_continuous: bool,
        primary_bit_mask: i32,
        data: Bytes,
        block_entity_count: i32,
        /// Auxiliary structured data, written with a 16-bit length prefix.
        block_entities: String,
    },
}

impl ClientboundPacket {
    pub fn id(&self) -> i32 {
        match self {
            ClientboundPacket::StatusResponse { .. } => cb::STATUS_RESPONSE,
            ClientboundPacket::Pong { .. } => cb::PONG,
            ClientboundPacket::LoginDisconnect { .. } => cb::LOGIN_DISCONNECT,
            ClientboundPacket::LoginSuccess { .. } => cb::LOGIN_SUCCESS,
            ClientboundPacket::JoinGame { .. } => cb::JOIN_GAME,
            ClientboundPacket::PlayerPositionLook { .. } => cb::PLAYER_POSITION_LOOK,
            ClientboundPacket::KeepAlive { .. } => cb::KEEP_ALIVE,
            ClientboundPacket::ChatMessage { .. } => cb::CHAT_MESSAGE,
            ClientboundPacket::ChunkData { .. } => cb::CHUNK_DATA,
        }
    }

    /// Builds the wire frame for this packet.
    pub fn encode(&self) -> EncodeResult<Bytes> {
        let mut w = PacketWriter::new(self.id());
        match self {
            ClientboundPacket::StatusResponse { json } => {
                w.write_string(json, MAX_JSON_CHARS)?;
            }
            ClientboundPacket::Pong { payload } => w.write_i64(*payload),
            ClientboundPacket::LoginDisconnect { reason } => {
                w.write_string(reason, MAX_JSON_CHARS)?;
            }
            ClientboundPacket::LoginSuccess { uuid, username } => {
                w.write_string(uuid, MAX_UUID_CHARS)?;
                w.write_string(username, MAX_USERNAME_CHARS)?;
            }
            ClientboundPacket::JoinGame {
                entity_id,
                gamemode,
                dimension,
                difficulty,
                max_players,
                level_type,
                reduced_debug_info,
            } => {
                w.write_i32(*entity_id);
                w.write_u8(*gamemode);
                w.write_i32(*dimension);
                w.write_u8(*difficulty);
                w.write_u8(*max_players);
                w.write_string(level_type, MAX_LEVEL_TYPE_CHARS)?;
                w.write_bool(*reduced_debug_info);
            }
            ClientboundPacket::PlayerPositionLook {
                position,
                rotation,
                flags,
                teleport_id,
            } => {
                write_position(&mut w, position);
                write_rotation(&mut w, rotation);
                w.write_u8(*flags);
                w.write_varint(*teleport_id);
            }
            ClientboundPacket::KeepAlive { id } => w.write_i64(*id),
            ClientboundPacket::ChatMessage { json, position } => {
                w.write_string(json, MAX_JSON_CHARS)?;
                w.write_u8(*position);
            }
            ClientboundPacket::ChunkData {
                chunk_x,
                chunk_z,
                ground_up_continuous,
                primary_bit_mask,
                data,
                block_entity_count,
                block_entities,
            } => {
                w.write_i32(*chunk_x);
                w.write_i32(*chunk_z);
                w.write_bool(*ground_up_continuous);
                w.write_varint(*primary_bit_mask);
                w.write_byte_array(data)?;
                w.write_varint(*block_entity_count);
                w.write_legacy_string(block_entities)?;
            }
        }
        w.finalize()
    }

    /// Decodes a frame payload as the client would, given the state it is in.
    pub fn decode(state: ConnectionState, payload: Bytes) -> Result<Self, PacketError> {
        let mut r = PacketReader::new(payload);
        let id = r.read_varint()?;

        let packet = match (state, id) {
            (ConnectionState::Status, cb::STATUS_RESPONSE) => ClientboundPacket::StatusResponse {
                json: r.read_string(MAX_JSON_CHARS)?,
            },
            (ConnectionState::Status, cb::PONG) => ClientboundPacket::Pong {
                payload: r.read_i64()?,
            },
            (ConnectionState::Login, cb::LOGIN_DISCONNECT) => ClientboundPacket::LoginDisconnect {
                reason: r.read_string(MAX_JSON_CHARS)?,
            },
            (ConnectionState::Login, cb::LOGIN_SUCCESS) => ClientboundPacket::LoginSuccess {
                uuid: r.read_string(MAX_UUID_CHARS)?,
                username: r.read_string(MAX_USERNAME_CHARS)?,
            },
            (ConnectionState::Play, cb::JOIN_GAME) => ClientboundPacket::JoinGame {
                entity_id: r.read_i32()?,
                gamemode: r.read_u8()?,
                dimension: r.read_i32()?,
                difficulty: r.read_u8()?,
                max_players: r.read_u8()?,
                level_type: r.read_string(MAX_LEVEL_TYPE_CHARS)?,
                reduced_debug_info: r.read_bool()?,
            },
            (ConnectionState::Play, cb::PLAYER_POSITION_LOOK) => {
                ClientboundPacket::PlayerPositionLook {
                    position: read_position(&mut r)?,
                    rotation: read_rotation(&mut r)?,
                    flags: r.read_u8()?,
                    teleport_id: r.read_varint()?,
                }
            }
            (ConnectionState::Play, cb::KEEP_ALIVE) => ClientboundPacket::KeepAlive {
                id: r.read_i64()?,
            },
            (ConnectionState::Play, cb::CHAT_MESSAGE) => ClientboundPacket::ChatMessage {
                json: r.read_string(MAX_JSON_CHARS)?,
                position: r.read_u8()?,
            },
            (ConnectionState::Play, cb::CHUNK_DATA) => ClientboundPacket::ChunkData {
                chunk_x: r.read_i32()?,
                chunk_z: r.read_i32()?,
                ground_up_continuous: r.read_bool()?,
                primary_bit_mask: r.read_varint()?,
                data: r.read_byte_array()?,
                block_entity_count: r.read_varint()?,
                block_entities: r.read_legacy_string()?,
            },
            _ => return Err(PacketError::UnknownPacket { state, id }),
        };

        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::frame::FrameAssembler;
    use assert_approx_eq::assert_approx_eq;

    /// Strips the length prefix the way the server's read path does.
    fn unframe(frame: Bytes) -> Bytes {
        let mut assembler = FrameAssembler::default();
        let mut frames = assembler.push(&frame).unwrap();
        assert_eq!(frames.len(), 1);
        frames.remove(0)
    }

    #[test]
    fn test_decode_handshake_from_raw_bytes() {
        let mut payload = vec![0x00, 0xD4, 0x02, 9];
        payload.extend_from_slice(b"localhost");
        payload.extend_from_slice(&[0x63, 0xDD, 0x02]);

        let packet =
            ServerboundPacket::decode(ConnectionState::Handshake, Bytes::from(payload)).unwrap();
        assert_eq!(
            packet,
            ServerboundPacket::Handshake {
                protocol_version: 340,
                server_address: "localhost".to_string(),
                server_port: 25565,
                next_state: 2,
            }
        );
    }

    #[test]
    fn test_same_id_means_different_things_per_state() {
        let request = Bytes::from_static(&[0x00]);
        assert_eq!(
            ServerboundPacket::decode(ConnectionState::Status, request.clone()).unwrap(),
            ServerboundPacket::StatusRequest
        );

        let login = Bytes::from_static(&[0x00, 0x03, b'B', b'o', b'b']);
        assert_eq!(
            ServerboundPacket::decode(ConnectionState::Login, login).unwrap(),
            ServerboundPacket::LoginStart {
                username: "Bob".to_string()
            }
        );

        let confirm = Bytes::from_static(&[0x00, 0x01]);
        assert_eq!(
            ServerboundPacket::decode(ConnectionState::Play, confirm).unwrap(),
            ServerboundPacket::TeleportConfirm { teleport_id: 1 }
        );

        // a bare 0x00 in Handshake is a truncated handshake, not a status request
        assert!(matches!(
            ServerboundPacket::decode(ConnectionState::Handshake, request),
            Err(PacketError::Decode(DecodeError::OutOfData { .. }))
        ));
    }

    #[test]
    fn test_unknown_id_is_reported_with_state() {
        let result = ServerboundPacket::decode(ConnectionState::Handshake, Bytes::from_static(&[0x05]));
        assert_eq!(
            result,
            Err(PacketError::UnknownPacket {
                state: ConnectionState::Handshake,
                id: 0x05
            })
        );

        let result = ServerboundPacket::decode(ConnectionState::Play, Bytes::from_static(&[0x40]));
        assert!(matches!(result, Err(PacketError::UnknownPacket { id: 0x40, .. })));

        let result =
            ServerboundPacket::decode(ConnectionState::Disconnected, Bytes::from_static(&[0x00]));
        assert!(matches!(result, Err(PacketError::UnknownPacket { .. })));
    }

    #[test]
    fn test_empty_payload_has_no_id() {
        let result = ServerboundPacket::decode(ConnectionState::Play, Bytes::new());
        assert!(matches!(
            result,
            Err(PacketError::Decode(DecodeError::OutOfData { .. }))
        ));
    }

    #[test]
    fn test_trailing_bytes_are_tolerated() {
        let payload = Bytes::from_static(&[0x0C, 0x01, 0xDE, 0xAD]);
        assert_eq!(
            ServerboundPacket::decode(ConnectionState::Play, payload).unwrap(),
            ServerboundPacket::Player { on_ground: true }
        );
    }

    #[test]
    fn test_username_over_limit_is_rejected() {
        let packet = ServerboundPacket::LoginStart {
            username: "a".repeat(16),
        };
        let mut payload = unframe(packet.encode().unwrap()).to_vec();
        // grow the name to 17 characters by patching length and appending
        payload[1] = 17;
        payload.push(b'a');

        assert_eq!(
            ServerboundPacket::decode(ConnectionState::Login, Bytes::from(payload)),
            Err(PacketError::Decode(DecodeError::CharLimitExceeded {
                count: 17,
                max: 16
            }))
        );
    }

    #[test]
    fn test_movement_packets_decode_fields() {
        let packet = ServerboundPacket::PlayerPositionLook {
            position: Position::new(10.5, 64.0, -3.25),
            rotation: Rotation::new(90.0, -45.5),
            on_ground: true,
        };
        let decoded = ServerboundPacket::decode(
            ConnectionState::Play,
            unframe(packet.encode().unwrap()),
        )
        .unwrap();

        match decoded {
            ServerboundPacket::PlayerPositionLook {
                position,
                rotation,
                on_ground,
            } => {
                assert_approx_eq!(position.x, 10.5);
                assert_approx_eq!(position.y, 64.0);
                assert_approx_eq!(position.z, -3.25);
                assert_approx_eq!(rotation.yaw, 90.0);
                assert_approx_eq!(rotation.pitch, -45.5);
                assert!(on_ground);
            }
            other => panic!("Unexpected packet {:?}", other),
        }

        let look = ServerboundPacket::PlayerLook {
            rotation: Rotation::new(1.0, 2.0),
            on_ground: false,
        };
        let payload = unframe(look.encode().unwrap());
        assert_eq!(payload.len(), 1 + 4 + 4 + 1);
        assert_eq!(payload[0], 0x0F);
    }

    #[test]
    fn test_keep_alive_id_is_fixed_width() {
        let frame = ClientboundPacket::KeepAlive { id: 1 }.encode().unwrap();
        assert_eq!(&frame[..], &[9, 0x1F, 0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_pong_echoes_payload_layout() {
        let frame = ClientboundPacket::Pong { payload: 1234 }.encode().unwrap();
        assert_eq!(&frame[..], &[9, 0x01, 0, 0, 0, 0, 0, 0, 0x04, 0xD2]);
    }

    #[test]
    fn test_join_game_layout() {
        let frame = ClientboundPacket::JoinGame {
            entity_id: 7,
            gamemode: 1,
            dimension: -1,
            difficulty: 2,
            max_players: 16,
            level_type: "default".to_string(),
            reduced_debug_info: false,
        }
        .encode()
        .unwrap();

        let mut expected = vec![0x23, 0, 0, 0, 7, 1, 0xFF, 0xFF, 0xFF, 0xFF, 2, 16, 7];
        expected.extend_from_slice(b"default");
        expected.push(0);
        assert_eq!(frame[0] as usize, expected.len());
        assert_eq!(&frame[1..], &expected[..]);
    }

    #[test]
    fn test_position_look_layout() {
        let frame = ClientboundPacket::PlayerPositionLook {
            position: Position::new(0.0, 64.0, 0.0),
            rotation: Rotation::default(),
            flags: 0,
            teleport_id: 300,
        }
        .encode()
        .unwrap();

        // id + 3 doubles + 2 floats + flags + 2-byte varint
        assert_eq!(frame[0], 1 + 24 + 8 + 1 + 2);
        assert_eq!(frame[1], 0x2F);
        assert_eq!(&frame[10..18], &64.0f64.to_be_bytes());
        assert_eq!(&frame[frame.len() - 2..], &[0xAC, 0x02]);
    }

    #[test]
    fn test_chunk_data_layout() {
        let packet = ClientboundPacket::ChunkData {
            chunk_x: -1,
            chunk_z: 2,
            ground_up_continuous: true,
            primary_bit_mask: 0,
            data: Bytes::from(vec![1u8; 256]),
            block_entity_count: 0,
            block_entities: String::new(),
        };
        let payload = unframe(packet.encode().unwrap());

        assert_eq!(payload[0], 0x20);
        assert_eq!(&payload[1..5], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&payload[5..9], &[0, 0, 0, 2]);
        assert_eq!(payload[9], 1);
        assert_eq!(payload[10], 0);
        assert_eq!(&payload[11..13], &[0x80, 0x02]);
        assert_eq!(payload.len(), 13 + 256 + 1 + 2);
        assert_eq!(&payload[payload.len() - 2..], &[0, 0]);

        let decoded = ClientboundPacket::decode(ConnectionState::Play, payload).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_login_success_enforces_uuid_length() {
        let packet = ClientboundPacket::LoginSuccess {
            uuid: "x".repeat(37),
            username: "Alice".to_string(),
        };
        assert!(packet.encode().is_err());
    }

    #[test]
    fn test_clientbound_decode_respects_state() {
        let frame = ClientboundPacket::LoginDisconnect {
            reason: r#"{"text":"full"}"#.to_string(),
        }
        .encode()
        .unwrap();
        let payload = unframe(frame);

        assert!(matches!(
            ClientboundPacket::decode(ConnectionState::Login, payload.clone()),
            Ok(ClientboundPacket::LoginDisconnect { .. })
        ));
        // the same id in Status is a status response
        assert!(matches!(
            ClientboundPacket::decode(ConnectionState::Status, payload),
            Ok(ClientboundPacket::StatusResponse { .. })
        ));
    }

    #[test]
    fn test_next_state_mapping() {
        assert_eq!(
            ConnectionState::from_next_state(1),
            Some(ConnectionState::Status)
        );
        assert_eq!(
            ConnectionState::from_next_state(2),
            Some(ConnectionState::Login)
        );
        assert_eq!(ConnectionState::from_next_state(3), None);
        assert_eq!(ConnectionState::from_next_state(0), None);
    }
}

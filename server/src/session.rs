//! Per-connection protocol state machine
//!
//! A [`Session`] exists for every accepted TCP connection. It decides what each
//! inbound frame means given the current [`ConnectionState`], updates its own
//! state, and queues replies on its [`Outbox`]. Effects that reach beyond the
//! connection (chat fan-out, closing the socket) are returned to the caller as
//! a [`SessionEvent`] so the session never needs a reference to its peers.
//!
//! State progression is forward-only:
//!
//! ```text
//! Handshake ──next_state=1──> Status
//!     └──────next_state=2──> Login ──Login-Start──> Play
//!                              └──server full──> Disconnected
//! ```

use bytes::Bytes;
use log::{debug, error, info, warn};
use protocol::packets::ServerboundPacket;
use protocol::text::{ServerStatus, TextComponent};
use protocol::{ClientboundPacket, ConnectionState, PacketError, Position, Rotation};
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::config::ServerConfig;

/// Idle time after which a player in `Play` is sent a Keep-Alive.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(20);

const LEVEL_TYPE: &str = "default";
const GAMEMODE_SURVIVAL: u8 = 0;
const DIMENSION_OVERWORLD: i32 = 0;
const DIFFICULTY_EASY: u8 = 1;

/// Unique identifier of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Queue of finalized frames waiting for the connection's writer task.
///
/// Every write to a socket goes through its outbox, so frames from the
/// session itself, the tick task and broadcasts are never interleaved.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Bytes>,
}

impl Outbox {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queues an already encoded frame. Returns false if it was dropped.
    pub fn send_frame(&self, frame: Bytes) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                warn!(
                    "Outbound queue full, dropping frame of {} bytes",
                    frame.len()
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Outbound queue closed, writer is gone");
                false
            }
        }
    }

    pub fn send(&self, packet: &ClientboundPacket) -> bool {
        match packet.encode() {
            Ok(frame) => self.send_frame(frame),
            Err(e) => {
                error!("Failed to encode packet 0x{:02X}: {}", packet.id(), e);
                false
            }
        }
    }
}

/// Shared server facilities a session needs while handling packets.
pub trait SessionContext {
    fn config(&self) -> &ServerConfig;

    /// Players currently in `Play`.
    fn online_players(&self) -> usize;

    /// Claims one player slot; false when the server is full.
    fn try_reserve_slot(&self) -> bool;

    fn next_entity_id(&self) -> i32;
}

/// Effects of a packet that the connection owner must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Send this chat line to every player.
    Broadcast(String),
    /// Stop reading and close the connection once queued frames are written.
    Close,
}

/// Server-side state of one connection.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    peer: SocketAddr,
    state: ConnectionState,
    username: Option<String>,
    uuid: Option<Uuid>,
    entity_id: Option<i32>,
    position: Position,
    rotation: Rotation,
    on_ground: bool,
    last_keep_alive: Instant,
    pending_keep_alive: Option<i64>,
    next_teleport_id: i32,
    outbox: Outbox,
}

impl Session {
    pub fn new(id: ConnectionId, peer: SocketAddr, outbox: Outbox) -> Self {
        Self {
            id,
            peer,
            state: ConnectionState::Handshake,
            username: None,
            uuid: None,
            entity_id: None,
            position: Position::default(),
            rotation: Rotation::default(),
            on_ground: false,
            last_keep_alive: Instant::now(),
            pending_keep_alive: None,
            next_teleport_id: 1,
            outbox,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn entity_id(&self) -> Option<i32> {
        self.entity_id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn on_ground(&self) -> bool {
        self.on_ground
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    fn display_name(&self) -> String {
        match &self.username {
            Some(name) => format!("{} ({})", name, self.id),
            None => format!("client {}", self.id),
        }
    }

    /// Handles one complete frame payload.
    ///
    /// Decode failures and unknown identifiers are logged here and never
    /// escape; the caller just moves on to the next frame.
    pub fn handle_frame(
        &mut self,
        payload: Bytes,
        ctx: &impl SessionContext,
    ) -> Option<SessionEvent> {
        if self.state == ConnectionState::Disconnected {
            return None;
        }

        match ServerboundPacket::decode(self.state, payload) {
            Ok(packet) => {
                debug!("{} -> {:?}", self.display_name(), packet);
                self.handle_packet(packet, ctx)
            }
            Err(PacketError::UnknownPacket { state, id }) => {
                if state == ConnectionState::Play {
                    debug!(
                        "Ignoring unknown packet 0x{:02X} from {}",
                        id,
                        self.display_name()
                    );
                } else {
                    warn!(
                        "Protocol violation from {}: packet 0x{:02X} is not valid in {:?}",
                        self.display_name(),
                        id,
                        state
                    );
                }
                None
            }
            Err(PacketError::Decode(e)) => {
                warn!("Malformed packet from {}: {}", self.display_name(), e);
                None
            }
        }
    }

    fn handle_packet(
        &mut self,
        packet: ServerboundPacket,
        ctx: &impl SessionContext,
    ) -> Option<SessionEvent> {
        match packet {
            ServerboundPacket::Handshake {
                protocol_version,
                server_address,
                server_port,
                next_state,
            } => {
                match ConnectionState::from_next_state(next_state) {
                    Some(state) => {
                        info!(
                            "Handshake from {} (protocol {}, {}:{}) -> {:?}",
                            self.peer, protocol_version, server_address, server_port, state
                        );
                        self.state = state;
                    }
                    None => warn!(
                        "Protocol violation from {}: invalid next state {}",
                        self.display_name(),
                        next_state
                    ),
                }
                None
            }

            ServerboundPacket::StatusRequest => {
                let status = ServerStatus::new(
                    &ctx.config().motd,
                    u32::from(ctx.config().max_players),
                    ctx.online_players() as u32,
                );
                match status.to_json() {
                    Ok(json) => {
                        self.outbox.send(&ClientboundPacket::StatusResponse { json });
                    }
                    Err(e) => error!("Failed to build status response: {}", e),
                }
                None
            }

            ServerboundPacket::Ping { payload } => {
                self.outbox.send(&ClientboundPacket::Pong { payload });
                None
            }

            ServerboundPacket::LoginStart { username } => self.login(username, ctx),

            ServerboundPacket::TeleportConfirm { teleport_id } => {
                debug!(
                    "{} confirmed teleport {}",
                    self.display_name(),
                    teleport_id
                );
                None
            }

            ServerboundPacket::ChatMessage { message } => {
                let name = self.username.as_deref().unwrap_or("?");
                Some(SessionEvent::Broadcast(format!("<{}> {}", name, message)))
            }

            ServerboundPacket::KeepAlive { id } => {
                if self.pending_keep_alive == Some(id) {
                    self.pending_keep_alive = None;
                } else {
                    debug!(
                        "{} answered unexpected keep-alive {}",
                        self.display_name(),
                        id
                    );
                }
                None
            }

            ServerboundPacket::Player { on_ground } => {
                self.on_ground = on_ground;
                None
            }

            ServerboundPacket::PlayerPosition {
                position,
                on_ground,
            } => {
                self.position = position;
                self.on_ground = on_ground;
                None
            }

            ServerboundPacket::PlayerPositionLook {
                position,
                rotation,
                on_ground,
            } => {
                self.position = position;
                self.rotation = rotation;
                self.on_ground = on_ground;
                None
            }

            ServerboundPacket::PlayerLook {
                rotation,
                on_ground,
            } => {
                self.rotation = rotation;
                self.on_ground = on_ground;
                None
            }
        }
    }

    fn login(&mut self, username: String, ctx: &impl SessionContext) -> Option<SessionEvent> {
        let config = ctx.config();

        if !ctx.try_reserve_slot() {
            info!(
                "Rejecting login of {} from {}: server full ({} players)",
                username, self.peer, config.max_players
            );
            match TextComponent::plain("The server is full!").to_json() {
                Ok(reason) => {
                    self.outbox
                        .send(&ClientboundPacket::LoginDisconnect { reason });
                }
                Err(e) => error!("Failed to build disconnect reason: {}", e),
            }
            self.state = ConnectionState::Disconnected;
            return Some(SessionEvent::Close);
        }

        let entity_id = ctx.next_entity_id();
        let uuid = Uuid::new_v4();

        self.outbox.send(&ClientboundPacket::LoginSuccess {
            uuid: uuid.hyphenated().to_string(),
            username: username.clone(),
        });

        self.outbox.send(&ClientboundPacket::JoinGame {
            entity_id,
            gamemode: GAMEMODE_SURVIVAL,
            dimension: DIMENSION_OVERWORLD,
            difficulty: DIFFICULTY_EASY,
            max_players: config.max_players,
            level_type: LEVEL_TYPE.to_string(),
            reduced_debug_info: false,
        });

        self.position = Position::new(
            f64::from(config.spawn.x),
            f64::from(config.spawn.y),
            f64::from(config.spawn.z),
        );
        self.rotation = Rotation::default();
        let teleport_id = self.next_teleport_id;
        self.next_teleport_id = self.next_teleport_id.wrapping_add(1);

        self.outbox.send(&ClientboundPacket::PlayerPositionLook {
            position: self.position,
            rotation: self.rotation,
            flags: 0,
            teleport_id,
        });

        info!(
            "{} logged in from {} as entity {} ({})",
            username, self.peer, entity_id, uuid
        );

        self.username = Some(username);
        self.uuid = Some(uuid);
        self.entity_id = Some(entity_id);
        self.state = ConnectionState::Play;
        self.last_keep_alive = Instant::now();
        None
    }

    /// Whether a Keep-Alive is owed at `now`.
    pub fn keep_alive_due(&self, now: Instant) -> bool {
        self.state == ConnectionState::Play
            && now.saturating_duration_since(self.last_keep_alive) >= KEEP_ALIVE_INTERVAL
    }

    /// Sends a Keep-Alive if one is due and restarts the idle timer.
    pub fn tick_keep_alive(&mut self, now: Instant) -> bool {
        if !self.keep_alive_due(now) {
            return false;
        }
        let id: i64 = rand::random();
        self.outbox.send(&ClientboundPacket::KeepAlive { id });
        self.pending_keep_alive = Some(id);
        self.last_keep_alive = now;
        true
    }
}

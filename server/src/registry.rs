//! Shared table of live connections.
//!
//! Only the accept loop inserts and removes entries. Connection tasks and the
//! tick task take the read lock to look sessions up or fan frames out.

use log::{debug, error, info};
use protocol::text::TextComponent;
use protocol::{ClientboundPacket, ConnectionState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::session::{ConnectionId, Session, SessionContext};

pub type SharedSession = Arc<tokio::sync::Mutex<Session>>;

const CHAT_POSITION_CHAT: u8 = 0;

pub struct Registry {
    config: ServerConfig,
    sessions: RwLock<HashMap<ConnectionId, SharedSession>>,
    chat_log: Mutex<Vec<String>>,
    next_connection_id: AtomicU64,
    next_entity_id: AtomicI32,
    players_in_play: AtomicUsize,
}

impl Registry {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            chat_log: Mutex::new(Vec::new()),
            next_connection_id: AtomicU64::new(1),
            next_entity_id: AtomicI32::new(1),
            players_in_play: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn insert(&self, session: Session) -> SharedSession {
        let id = session.id();
        let shared = Arc::new(tokio::sync::Mutex::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&shared));
        debug!("Registered connection {}", id);
        shared
    }

    /// Removes a connection and frees its player slot if it had one.
    pub async fn remove(&self, id: ConnectionId) -> Option<SharedSession> {
        let removed = self.sessions.write().await.remove(&id)?;

        let session = removed.lock().await;
        if session.state() == ConnectionState::Play {
            self.release_slot();
            if let Some(name) = session.username() {
                info!("{} left the game ({} online)", name, self.online_players());
            }
        } else {
            debug!("Connection {} closed in {:?}", id, session.state());
        }
        drop(session);

        Some(removed)
    }

    pub async fn get(&self, id: ConnectionId) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub fn online_players(&self) -> usize {
        self.players_in_play.load(Ordering::SeqCst)
    }

    /// Every chat line broadcast so far, oldest first.
    pub fn chat_history(&self) -> Vec<String> {
        match self.chat_log.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn release_slot(&self) {
        let _ = self
            .players_in_play
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Sends a chat line to every session in `Play`, including its author.
    ///
    /// The frame is encoded once and queued on each outbox, so a slow
    /// recipient never blocks the others. Returns the number of recipients.
    ///
    /// Callers must not hold any session lock.
    pub async fn broadcast(&self, message: &str) -> usize {
        let packet = match TextComponent::plain(message).to_json() {
            Ok(json) => ClientboundPacket::ChatMessage {
                json,
                position: CHAT_POSITION_CHAT,
            },
            Err(e) => {
                error!("Failed to build chat component: {}", e);
                return 0;
            }
        };
        let frame = match packet.encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode chat message: {}", e);
                return 0;
            }
        };

        match self.chat_log.lock() {
            Ok(mut log) => log.push(message.to_string()),
            Err(poisoned) => poisoned.into_inner().push(message.to_string()),
        }
        info!("[chat] {}", message);

        let sessions: Vec<SharedSession> = self.sessions.read().await.values().cloned().collect();
        let mut delivered = 0;
        for shared in sessions {
            let session = shared.lock().await;
            if session.state() == ConnectionState::Play && session.outbox().send_frame(frame.clone())
            {
                delivered += 1;
            }
        }
        delivered
    }

    /// Runs one server tick: Keep-Alives for every idle player.
    ///
    /// Returns how many Keep-Alives were sent.
    pub async fn tick(&self, now: Instant) -> usize {
        let sessions: Vec<SharedSession> = self.sessions.read().await.values().cloned().collect();
        let mut sent = 0;
        for shared in sessions {
            let mut session = shared.lock().await;
            if session.tick_keep_alive(now) {
                debug!("Sent keep-alive to {}", session.id());
                sent += 1;
            }
        }
        sent
    }
}

impl SessionContext for Registry {
    fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn online_players(&self) -> usize {
        Registry::online_players(self)
    }

    fn try_reserve_slot(&self) -> bool {
        let max = usize::from(self.config.max_players);
        self.players_in_play
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .is_ok()
    }

    fn next_entity_id(&self) -> i32 {
        self.next_entity_id.fetch_add(1, Ordering::Relaxed)
    }
}
